//! Translation of Postgres failures into repository errors.

use std::borrow::Cow;

use sqlx::error::{DatabaseError, ErrorKind};

use crate::application::repos::{RepoError, constraints};

/// SQLSTATE `invalid_text_representation`.
const INVALID_TEXT: &str = "22P02";
/// SQLSTATE `query_canceled`, raised by `statement_timeout`.
const QUERY_CANCELED: &str = "57014";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => map_database_error(db.as_ref()),
        other => RepoError::from_persistence(other),
    }
}

fn map_database_error(db: &dyn DatabaseError) -> RepoError {
    match db.kind() {
        ErrorKind::UniqueViolation => RepoError::Duplicate {
            constraint: unique_constraint(db.constraint()).to_string(),
        },
        ErrorKind::ForeignKeyViolation => RepoError::Integrity {
            message: missing_reference(db.constraint()),
        },
        ErrorKind::NotNullViolation | ErrorKind::CheckViolation => RepoError::Integrity {
            message: db.message().to_string(),
        },
        _ => match db.code().as_deref() {
            Some(INVALID_TEXT) => RepoError::InvalidInput {
                message: db.message().to_string(),
            },
            Some(QUERY_CANCELED) => RepoError::Timeout,
            _ => RepoError::from_persistence(db.message()),
        },
    }
}

fn unique_constraint(name: Option<&str>) -> Cow<'static, str> {
    match name {
        Some(constraints::USERNAME_UNIQUE) => Cow::Borrowed(constraints::USERNAME_UNIQUE),
        Some(constraints::GROUP_SLUG_UNIQUE) => Cow::Borrowed(constraints::GROUP_SLUG_UNIQUE),
        Some(constraints::FOLLOW_UNIQUE) => Cow::Borrowed(constraints::FOLLOW_UNIQUE),
        Some(other) => Cow::Owned(other.to_string()),
        None => Cow::Borrowed("unknown"),
    }
}

/// Names the kind of record a dangling reference points at.
fn missing_reference(constraint: Option<&str>) -> String {
    let target = match constraint {
        Some("posts_author_id_fkey" | "comments_author_id_fkey") => "user",
        Some("follows_user_id_fkey" | "follows_author_id_fkey") => "user",
        Some("posts_group_id_fkey") => "group",
        Some("comments_post_id_fkey") => "post",
        Some(other) => return format!("reference `{other}` does not exist"),
        None => return "referenced record does not exist".to_string(),
    };
    format!("{target} does not exist")
}
