//! Process-local storage used when no database URL is configured.
//!
//! Mirrors the relational rules of the Postgres schema: unique usernames,
//! slugs and follow edges, cascading deletes from users and posts, and
//! `SET NULL` for posts of a removed group.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, FollowsRepo,
    GroupsRepo, PostListScope, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams, UsersRepo,
    constraints,
};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::entities::{
    CommentId, CommentRecord, Created, FollowId, FollowRecord, GroupId, GroupRecord, PostId,
    PostRecord, UserId, UserRecord,
};

const SOURCE: &str = "infra::memory";

#[derive(Debug, Clone)]
struct PostRow {
    id: PostId,
    text: String,
    created: Created,
    author_id: UserId,
    group_id: Option<GroupId>,
    image: Option<String>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    id: CommentId,
    post_id: PostId,
    author_id: UserId,
    text: String,
    created: Created,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserRecord>,
    groups: BTreeMap<GroupId, GroupRecord>,
    posts: BTreeMap<PostId, PostRow>,
    comments: BTreeMap<CommentId, CommentRow>,
    follows: Vec<FollowRecord>,
    next_user: UserId,
    next_group: GroupId,
    next_post: PostId,
    next_comment: CommentId,
    next_follow: FollowId,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl Tables {
    fn user(&self, id: UserId) -> Result<&UserRecord, RepoError> {
        self.users.get(&id).ok_or_else(|| RepoError::Integrity {
            message: format!("user {id} does not exist"),
        })
    }

    fn check_group(&self, id: Option<GroupId>) -> Result<(), RepoError> {
        match id {
            Some(id) if !self.groups.contains_key(&id) => Err(RepoError::Integrity {
                message: format!("group {id} does not exist"),
            }),
            _ => Ok(()),
        }
    }

    fn post_record(&self, row: &PostRow) -> Result<PostRecord, RepoError> {
        Ok(PostRecord {
            id: row.id,
            text: row.text.clone(),
            created: row.created,
            author: self.user(row.author_id)?.clone(),
            group: row
                .group_id
                .and_then(|id| self.groups.get(&id))
                .map(GroupRecord::summary),
            image: row.image.clone(),
        })
    }

    fn in_scope(&self, row: &PostRow, scope: PostListScope) -> bool {
        match scope {
            PostListScope::All => true,
            PostListScope::Group(group_id) => row.group_id == Some(group_id),
            PostListScope::Author(author_id) => row.author_id == author_id,
            PostListScope::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|edge| edge.user_id == user_id && edge.author_id == row.author_id),
        }
    }

    /// Posts in `scope`, newest first with id breaking timestamp ties.
    fn scoped_posts(&self, scope: PostListScope) -> Vec<&PostRow> {
        let mut rows: Vec<&PostRow> = self
            .posts
            .values()
            .filter(|row| self.in_scope(row, scope))
            .collect();
        rows.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        rows
    }

    fn remove_post(&mut self, id: PostId) {
        self.posts.remove(&id);
        self.comments.retain(|_, comment| comment.post_id != id);
    }
}

/// All repository traits over one shared in-process table set.
#[derive(Debug, Default)]
pub struct InMemoryRepositories {
    tables: RwLock<Tables>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsersRepo for InMemoryRepositories {
    async fn create_user(&self, username: &str) -> Result<UserRecord, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "create_user");
        if tables.users.values().any(|user| user.username == username) {
            return Err(RepoError::Duplicate {
                constraint: constraints::USERNAME_UNIQUE.to_string(),
            });
        }
        let id = next_id(&mut tables.next_user);
        let record = UserRecord {
            id,
            username: username.to_string(),
        };
        tables.users.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "find_user_by_id");
        Ok(tables.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "find_by_username");
        Ok(tables
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn delete_user(&self, id: UserId) -> Result<(), RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "delete_user");
        if tables.users.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }

        let authored: Vec<PostId> = tables
            .posts
            .values()
            .filter(|post| post.author_id == id)
            .map(|post| post.id)
            .collect();
        for post_id in authored {
            tables.remove_post(post_id);
        }
        tables.comments.retain(|_, comment| comment.author_id != id);
        tables
            .follows
            .retain(|edge| edge.user_id != id && edge.author_id != id);
        Ok(())
    }
}

#[async_trait]
impl GroupsRepo for InMemoryRepositories {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "create_group");
        if tables.groups.values().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: constraints::GROUP_SLUG_UNIQUE.to_string(),
            });
        }
        let id = next_id(&mut tables.next_group);
        let record = GroupRecord {
            id,
            title: params.title,
            slug: params.slug,
            description: params.description,
        };
        tables.groups.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: GroupId) -> Result<Option<GroupRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "find_group_by_id");
        Ok(tables.groups.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "find_by_slug");
        Ok(tables
            .groups
            .values()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "list_groups");
        let mut groups: Vec<GroupRecord> = tables.groups.values().cloned().collect();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn delete_group(&self, id: GroupId) -> Result<(), RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "delete_group");
        if tables.groups.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        for post in tables.posts.values_mut() {
            if post.group_id == Some(id) {
                post.group_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for InMemoryRepositories {
    async fn list_posts(
        &self,
        scope: PostListScope,
        page: PageRequest,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "list_posts");
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        tables
            .scoped_posts(scope)
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| tables.post_record(row))
            .collect()
    }

    async fn count_posts(&self, scope: PostListScope) -> Result<u64, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "count_posts");
        Ok(tables.scoped_posts(scope).len() as u64)
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<PostRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "find_post_by_id");
        tables
            .posts
            .get(&id)
            .map(|row| tables.post_record(row))
            .transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "create_post");
        tables.user(params.author_id)?;
        tables.check_group(params.group_id)?;

        let id = next_id(&mut tables.next_post);
        let row = PostRow {
            id,
            text: params.text,
            created: Created::now(),
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        let record = tables.post_record(&row)?;
        tables.posts.insert(id, row);
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "update_post");
        tables.check_group(params.group_id)?;

        let row = tables.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        row.text = params.text;
        row.group_id = params.group_id;
        if let Some(image) = params.image {
            row.image = Some(image);
        }
        let row = row.clone();
        tables.post_record(&row)
    }

    async fn delete_post(&self, id: PostId) -> Result<(), RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "delete_post");
        if !tables.posts.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        tables.remove_post(id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for InMemoryRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "create_comment");
        let author = tables.user(params.author_id)?.clone();
        if !tables.posts.contains_key(&params.post_id) {
            return Err(RepoError::Integrity {
                message: format!("post {} does not exist", params.post_id),
            });
        }

        let id = next_id(&mut tables.next_comment);
        let row = CommentRow {
            id,
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created: Created::now(),
        };
        let record = CommentRecord {
            id,
            post_id: row.post_id,
            text: row.text.clone(),
            created: row.created,
            author,
        };
        tables.comments.insert(id, row);
        Ok(record)
    }

    async fn list_for_post(&self, post_id: PostId) -> Result<Vec<CommentRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "list_for_post");
        let mut rows: Vec<&CommentRow> = tables
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        rows.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));

        rows.into_iter()
            .map(|row| {
                Ok(CommentRecord {
                    id: row.id,
                    post_id: row.post_id,
                    text: row.text.clone(),
                    created: row.created,
                    author: tables.user(row.author_id)?.clone(),
                })
            })
            .collect()
    }

    async fn count_comments(&self) -> Result<u64, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "count_comments");
        Ok(tables.comments.len() as u64)
    }
}

#[async_trait]
impl FollowsRepo for InMemoryRepositories {
    async fn follow(&self, user_id: UserId, author_id: UserId) -> Result<bool, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "follow");
        tables.user(user_id)?;
        tables.user(author_id)?;
        if tables
            .follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id)
        {
            return Ok(false);
        }
        let id = next_id(&mut tables.next_follow);
        tables.follows.push(FollowRecord {
            id,
            user_id,
            author_id,
        });
        Ok(true)
    }

    async fn unfollow(&self, user_id: UserId, author_id: UserId) -> Result<bool, RepoError> {
        let mut tables = rw_write(&self.tables, SOURCE, "unfollow");
        let before = tables.follows.len();
        tables
            .follows
            .retain(|edge| !(edge.user_id == user_id && edge.author_id == author_id));
        Ok(tables.follows.len() != before)
    }

    async fn is_following(&self, user_id: UserId, author_id: UserId) -> Result<bool, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "is_following");
        Ok(tables
            .follows
            .iter()
            .any(|edge| edge.user_id == user_id && edge.author_id == author_id))
    }

    async fn list_following(&self, user_id: UserId) -> Result<Vec<UserRecord>, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "list_following");
        let mut authors: Vec<UserRecord> = tables
            .follows
            .iter()
            .filter(|edge| edge.user_id == user_id)
            .filter_map(|edge| tables.users.get(&edge.author_id).cloned())
            .collect();
        authors.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(authors)
    }

    async fn count_follows(&self) -> Result<u64, RepoError> {
        let tables = rw_read(&self.tables, SOURCE, "count_follows");
        Ok(tables.follows.len() as u64)
    }
}
