//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::posts::short_label;

pub type UserId = i64;
pub type GroupId = i64;
pub type PostId = i64;
pub type CommentId = i64;
pub type FollowId = i64;

/// Creation timestamp of an authored record. Assigned once on insert and never
/// rewritten by updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Created(OffsetDateTime);

impl Created {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn at(timestamp: OffsetDateTime) -> Self {
        Self(timestamp)
    }

    pub fn timestamp(&self) -> OffsetDateTime {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: GroupId,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl GroupRecord {
    pub fn label(&self) -> &str {
        &self.title
    }

    pub fn summary(&self) -> GroupSummary {
        GroupSummary {
            id: self.id,
            slug: self.slug.clone(),
            title: self.title.clone(),
        }
    }
}

/// Group fields carried alongside a post when listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub id: GroupId,
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: PostId,
    pub text: String,
    pub created: Created,
    pub author: UserRecord,
    pub group: Option<GroupSummary>,
    /// Stored path relative to the uploads root, e.g. `posts/cat.gif`.
    pub image: Option<String>,
}

impl PostRecord {
    pub fn label(&self) -> String {
        short_label(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: CommentId,
    pub post_id: PostId,
    pub text: String,
    pub created: Created,
    pub author: UserRecord,
}

impl CommentRecord {
    pub fn label(&self) -> String {
        short_label(&self.text)
    }
}

/// Directed edge: `user_id` wants posts of `author_id` in their feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowRecord {
    pub id: FollowId,
    pub user_id: UserId,
    pub author_id: UserId,
}
