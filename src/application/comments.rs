use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::debug;

use crate::application::error::{HttpError, repo_error_to_http};
use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::entities::CommentRecord;
use crate::domain::posts::normalize_required_text;

const SOURCE: &str = "application::comments::CommentService";

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<CommentError> for HttpError {
    fn from(error: CommentError) -> Self {
        match error {
            CommentError::UnknownPost(_) => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
            CommentError::Repo(err) => repo_error_to_http(SOURCE, err),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CommentOutcome {
    Created(CommentRecord),
    /// Blank submissions are dropped without feedback.
    Dropped,
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostsRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self { posts, comments }
    }

    pub async fn add_comment(
        &self,
        post_id: i64,
        author_id: i64,
        text: &str,
    ) -> Result<CommentOutcome, CommentError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(CommentError::UnknownPost(post_id))?;

        let text = match normalize_required_text("text", text) {
            Ok(text) => text,
            Err(err) => {
                debug!(
                    target = "yatube::comments",
                    post_id,
                    author_id,
                    error = %err,
                    "comment dropped"
                );
                return Ok(CommentOutcome::Dropped);
            }
        };

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id,
                text,
            })
            .await?;
        Ok(CommentOutcome::Created(comment))
    }
}
