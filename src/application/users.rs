use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::{UserId, UserRecord};

pub const MAX_USERNAME_LEN: usize = 150;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("username is required")]
    EmptyUsername,
    #[error("username exceeds 150 characters")]
    UsernameTooLong,
    #[error("username `{0}` may only contain letters, digits and @/./+/-/_")]
    InvalidUsername(String),
    #[error("username `{0}` is already taken")]
    UsernameTaken(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Accepts letters, digits and `@.+-_`, up to [`MAX_USERNAME_LEN`] characters.
pub fn validate_username(raw: &str) -> Result<&str, UserError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(UserError::EmptyUsername);
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(UserError::UsernameTooLong);
    }
    let valid = username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(UserError::InvalidUsername(username.to_string()));
    }
    Ok(username)
}

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UsersRepo>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UsersRepo>) -> Self {
        Self { repo }
    }

    pub async fn create_user(&self, raw: &str) -> Result<UserRecord, UserError> {
        let username = validate_username(raw)?;
        let user = self.repo.create_user(username).await.map_err(|err| match err {
            RepoError::Duplicate { .. } => UserError::UsernameTaken(username.to_string()),
            other => UserError::Repo(other),
        })?;
        info!(
            target = "application::users",
            user_id = user.id,
            username = %user.username,
            "user created"
        );
        Ok(user)
    }

    /// The user behind a trusted identity header, if the name is known.
    pub async fn resolve(&self, username: &str) -> Result<Option<UserRecord>, UserError> {
        let username = username.trim();
        if username.is_empty() {
            return Ok(None);
        }
        Ok(self.repo.find_by_username(username).await?)
    }

    pub async fn delete_user(&self, id: UserId) -> Result<(), UserError> {
        self.repo.delete_user(id).await?;
        info!(target = "application::users", user_id = id, "user deleted");
        Ok(())
    }
}
