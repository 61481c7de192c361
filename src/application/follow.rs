use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::feed::{FeedError, FeedService};
use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{FollowsRepo, PostListScope, RepoError, UsersRepo};
use crate::domain::entities::{PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    /// Users cannot follow themselves; nothing is stored.
    SelfFollowIgnored,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
    feed: FeedService,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>, feed: FeedService) -> Self {
        Self {
            users,
            follows,
            feed,
        }
    }

    pub async fn follow(
        &self,
        follower: &UserRecord,
        author_username: &str,
    ) -> Result<(UserRecord, FollowOutcome), FollowError> {
        let author = self.resolve_author(author_username).await?;
        if author.id == follower.id {
            return Ok((author, FollowOutcome::SelfFollowIgnored));
        }

        let outcome = if self.follows.follow(follower.id, author.id).await? {
            info!(
                target = "application::follow",
                follower = %follower.username,
                author = %author.username,
                "follow edge created"
            );
            FollowOutcome::Created
        } else {
            FollowOutcome::AlreadyFollowing
        };
        Ok((author, outcome))
    }

    /// Removes the edge if present. Returns whether anything was removed.
    pub async fn unfollow(
        &self,
        follower: &UserRecord,
        author_username: &str,
    ) -> Result<(UserRecord, bool), FollowError> {
        let author = self.resolve_author(author_username).await?;
        let removed = self.follows.unfollow(follower.id, author.id).await?;
        if removed {
            info!(
                target = "application::follow",
                follower = %follower.username,
                author = %author.username,
                "follow edge removed"
            );
        }
        Ok((author, removed))
    }

    /// Posts by every author `follower` follows, newest first.
    pub async fn feed(
        &self,
        follower: &UserRecord,
        request: PageRequest,
    ) -> Result<Page<PostRecord>, FollowError> {
        Ok(self
            .feed
            .page(PostListScope::FollowedBy(follower.id), request)
            .await?)
    }

    pub async fn following(&self, follower: &UserRecord) -> Result<Vec<UserRecord>, FollowError> {
        Ok(self.follows.list_following(follower.id).await?)
    }

    async fn resolve_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
