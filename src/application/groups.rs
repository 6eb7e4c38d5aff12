use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::error::DomainError;
use crate::domain::posts::validate_group_title;
use crate::domain::slug::{SlugError, derive_slug, validate_slug};

#[derive(Debug, Error)]
pub enum GroupError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    pub async fn create(&self, cmd: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = validate_group_title(&cmd.title)?;
        let slug = match cmd.slug.as_deref() {
            Some(raw) => validate_slug(raw)?,
            None => derive_slug(&title)?,
        };
        let description = cmd
            .description
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let group = self
            .groups
            .create_group(CreateGroupParams {
                title,
                slug,
                description,
            })
            .await?;

        info!(
            target = "yatube::groups",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }
}
