use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::{GroupId, GroupRecord};
use crate::domain::posts::clean_text;
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async, validate_slug};

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group title is required")]
    MissingTitle,
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("slug `{0}` is already taken")]
    SlugTaken(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SlugAsyncError<RepoError>> for GroupError {
    fn from(err: SlugAsyncError<RepoError>) -> Self {
        match err {
            SlugAsyncError::Slug(err) => GroupError::Slug(err),
            SlugAsyncError::Predicate(err) => GroupError::Repo(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: String,
}

#[derive(Clone)]
pub struct GroupService {
    repo: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupsRepo>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, command: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = clean_text("title", &command.title).map_err(|_| GroupError::MissingTitle)?;

        let slug = match command.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => {
                validate_slug(slug)?;
                if self.repo.find_by_slug(slug).await?.is_some() {
                    return Err(GroupError::SlugTaken(slug.to_string()));
                }
                slug.to_string()
            }
            _ => {
                let repo = self.repo.clone();
                generate_unique_slug_async(&title, move |candidate| {
                    let repo = repo.clone();
                    let candidate = candidate.to_string();
                    async move {
                        let existing = repo.find_by_slug(&candidate).await?;
                        Ok::<bool, RepoError>(existing.is_none())
                    }
                })
                .await?
            }
        };

        let group = self
            .repo
            .create_group(CreateGroupParams {
                title,
                slug: slug.clone(),
                description: command.description.trim().to_string(),
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => GroupError::SlugTaken(slug),
                other => GroupError::Repo(other),
            })?;

        info!(
            target = "application::groups",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.repo.list_groups().await?)
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, GroupError> {
        Ok(self.repo.find_by_slug(slug).await?)
    }

    /// Deletes the group. Its posts remain, ungrouped.
    pub async fn delete(&self, id: GroupId) -> Result<(), GroupError> {
        self.repo.delete_group(id).await?;
        info!(target = "application::groups", group_id = id, "group deleted");
        Ok(())
    }
}
