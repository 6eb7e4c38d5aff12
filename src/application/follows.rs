//! Subscriptions between users and authors.
//!
//! Both operations are idempotent: following twice leaves one edge, and
//! unfollowing without an edge is a no-op. Self-follows are never stored.

use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::info;

use crate::application::error::{HttpError, repo_error_to_http};
use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;

const SOURCE: &str = "application::follows::FollowService";

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        match error {
            FollowError::UnknownAuthor(_) => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
            FollowError::Repo(err) => repo_error_to_http(SOURCE, err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Removed,
    NotFollowing,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    pub async fn follow(
        &self,
        viewer_id: i64,
        username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let author = self.find_author(username).await?;
        if author.id == viewer_id {
            return Ok(FollowOutcome::SelfFollow);
        }

        let created = self.follows.create_follow(viewer_id, author.id).await?;
        if created {
            info!(
                target = "yatube::follows",
                user_id = viewer_id,
                author_id = author.id,
                "follow created"
            );
            Ok(FollowOutcome::Created)
        } else {
            Ok(FollowOutcome::AlreadyFollowing)
        }
    }

    pub async fn unfollow(
        &self,
        viewer_id: i64,
        username: &str,
    ) -> Result<UnfollowOutcome, FollowError> {
        let author = self.find_author(username).await?;
        let removed = self.follows.delete_follow(viewer_id, author.id).await?;
        if removed > 0 {
            info!(
                target = "yatube::follows",
                user_id = viewer_id,
                author_id = author.id,
                "follow removed"
            );
            Ok(UnfollowOutcome::Removed)
        } else {
            Ok(UnfollowOutcome::NotFollowing)
        }
    }

    async fn find_author(&self, username: &str) -> Result<UserRecord, FollowError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FollowError::UnknownAuthor(username.to_string()))
    }
}
