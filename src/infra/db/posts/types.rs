use time::OffsetDateTime;

use crate::domain::entities::{Created, GroupSummary, PostRecord, UserRecord};

/// Post columns joined with author and optional group.
pub(crate) const POST_SELECT: &str = r#"
    SELECT p.id, p.text, p.created, p.image,
           u.id AS author_id, u.username AS author_username,
           g.id AS group_id, g.slug AS group_slug, g.title AS group_title
    FROM posts p
    INNER JOIN users u ON u.id = p.author_id
    LEFT JOIN groups g ON g.id = p.group_id
"#;

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: i64,
    pub(crate) text: String,
    pub(crate) created: OffsetDateTime,
    pub(crate) image: Option<String>,
    pub(crate) author_id: i64,
    pub(crate) author_username: String,
    pub(crate) group_id: Option<i64>,
    pub(crate) group_slug: Option<String>,
    pub(crate) group_title: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(GroupSummary { id, slug, title }),
            _ => None,
        };
        Self {
            id: row.id,
            text: row.text,
            created: Created::at(row.created),
            author: UserRecord {
                id: row.author_id,
                username: row.author_username,
            },
            group,
            image: row.image,
        }
    }
}
