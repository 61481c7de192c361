//! Listing composition for the index, group, profile and post pages.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::pagination::{Page, PageRequest, is_out_of_range};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostListScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostId, PostRecord, UserRecord};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("unknown post {0}")]
    UnknownPost(PostId),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl FeedError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FeedError::UnknownGroup(_) | FeedError::UnknownAuthor(_) | FeedError::UnknownPost(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct GroupListing {
    pub group: GroupRecord,
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct ProfileListing {
    pub author: UserRecord,
    pub page: Page<PostRecord>,
    pub post_count: u64,
    /// Whether the viewer currently follows `author`.
    pub following: bool,
    /// Whether the follow controls apply (signed-in viewer, not the author).
    pub can_follow: bool,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
    pub author_post_count: u64,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            comments,
            follows,
        }
    }

    /// One page of posts in `scope`, newest first.
    ///
    /// Pages past the end come back empty; they are not an error.
    pub async fn page(
        &self,
        scope: PostListScope,
        request: PageRequest,
    ) -> Result<Page<PostRecord>, FeedError> {
        let total = self.posts.count_posts(scope).await?;
        if is_out_of_range(total, request) {
            debug!(?scope, page = request.number, total, "page beyond listing");
            return Ok(Page::new(Vec::new(), request, total));
        }

        let items = self.posts.list_posts(scope, request).await?;
        Ok(Page::new(items, request, total))
    }

    pub async fn index(&self, request: PageRequest) -> Result<Page<PostRecord>, FeedError> {
        self.page(PostListScope::All, request).await
    }

    pub async fn group_list(
        &self,
        slug: &str,
        request: PageRequest,
    ) -> Result<GroupListing, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))?;
        let page = self.page(PostListScope::Group(group.id), request).await?;
        Ok(GroupListing { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer: Option<&UserRecord>,
        request: PageRequest,
    ) -> Result<ProfileListing, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownAuthor(username.to_string()))?;
        let page = self.page(PostListScope::Author(author.id), request).await?;

        let (following, can_follow) = match viewer {
            Some(viewer) if viewer.id != author.id => {
                (self.follows.is_following(viewer.id, author.id).await?, true)
            }
            _ => (false, false),
        };

        Ok(ProfileListing {
            post_count: page.total_count,
            author,
            page,
            following,
            can_follow,
        })
    }

    pub async fn post_detail(&self, id: PostId) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or(FeedError::UnknownPost(id))?;
        let comments = self.comments.list_for_post(id).await?;
        let author_post_count = self
            .posts
            .count_posts(PostListScope::Author(post.author.id))
            .await?;

        Ok(PostDetail {
            post,
            comments,
            author_post_count,
        })
    }
}
