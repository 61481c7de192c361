//! Wiring of repositories into services.

use std::sync::Arc;

use crate::application::{
    feed::FeedService,
    follow::FollowService,
    groups::GroupService,
    posts::PostService,
    repos::{CommentsRepo, FollowsRepo, GroupsRepo, PostsRepo, PostsWriteRepo, UsersRepo},
    users::UserService,
};
use crate::infra::uploads::UploadStorage;

/// Every repository trait object, usually backed by one store.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UsersRepo>,
    pub groups: Arc<dyn GroupsRepo>,
    pub posts: Arc<dyn PostsRepo>,
    pub posts_write: Arc<dyn PostsWriteRepo>,
    pub comments: Arc<dyn CommentsRepo>,
    pub follows: Arc<dyn FollowsRepo>,
}

impl Repositories {
    pub fn from_store<R>(store: Arc<R>) -> Self
    where
        R: UsersRepo + GroupsRepo + PostsRepo + PostsWriteRepo + CommentsRepo + FollowsRepo + 'static,
    {
        Self {
            users: store.clone(),
            groups: store.clone(),
            posts: store.clone(),
            posts_write: store.clone(),
            comments: store.clone(),
            follows: store,
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub feed: Arc<FeedService>,
    pub follow: Arc<FollowService>,
    pub posts: Arc<PostService>,
    pub users: Arc<UserService>,
    pub groups: Arc<GroupService>,
}

impl Services {
    pub fn new(repos: &Repositories, uploads: Arc<UploadStorage>) -> Self {
        let feed = FeedService::new(
            repos.posts.clone(),
            repos.groups.clone(),
            repos.users.clone(),
            repos.comments.clone(),
            repos.follows.clone(),
        );
        let follow = FollowService::new(repos.users.clone(), repos.follows.clone(), feed.clone());
        let posts = PostService::new(
            repos.posts.clone(),
            repos.posts_write.clone(),
            repos.groups.clone(),
            repos.comments.clone(),
            uploads,
        );

        Self {
            feed: Arc::new(feed),
            follow: Arc::new(follow),
            posts: Arc::new(posts),
            users: Arc::new(UserService::new(repos.users.clone())),
            groups: Arc::new(GroupService::new(repos.groups.clone())),
        }
    }
}
