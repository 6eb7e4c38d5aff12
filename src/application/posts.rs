//! Post authoring: creation and author-only editing.

use std::sync::Arc;

use axum::http::StatusCode;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::error::{HttpError, repo_error_to_http};
use crate::application::repos::{
    CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{GroupRecord, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::normalize_required_text;
use crate::infra::uploads::{UploadStorage, UploadStorageError};

const SOURCE: &str = "application::posts::PostService";
/// Upload sub-directory for post images.
pub const POST_IMAGE_DIRECTORY: &str = "posts";

const INVALID_GROUP_MESSAGE: &str =
    "Выберите корректный вариант. Вашего варианта нет среди допустимых значений.";
const EMPTY_IMAGE_MESSAGE: &str = "Отправленный файл пуст.";
const INVALID_IMAGE_MESSAGE: &str = "Загрузите правильное изображение. Файл, который вы загрузили, поврежден или не является изображением.";

/// An image file received with the post form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Bytes,
}

/// Raw post form submission.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    /// Raw `group` select value; empty means "no group".
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
    /// Drop the currently stored image when editing.
    pub clear_image: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFormErrors {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<String>,
}

impl PostFormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none() && self.image.is_none()
    }
}

#[derive(Debug, Error)]
pub enum PostFormError {
    #[error("post form failed validation")]
    Invalid(PostFormErrors),
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("failed to store post image")]
    Storage(#[from] UploadStorageError),
}

impl From<PostFormError> for HttpError {
    fn from(error: PostFormError) -> Self {
        match error {
            PostFormError::Invalid(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid post form",
                &error,
            ),
            PostFormError::UnknownPost(_) => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
            PostFormError::Repo(err) => repo_error_to_http(SOURCE, err),
            PostFormError::Storage(_) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not store uploaded image",
                &error,
            ),
        }
    }
}

/// Result of checking whether a viewer may edit a post.
#[derive(Debug, Clone)]
pub enum EditAccess {
    Author(PostRecord),
    /// The viewer is not the author; callers redirect to the post without changes.
    NotAuthor(PostRecord),
}

#[derive(Debug, Clone)]
struct ValidatedDraft {
    text: String,
    group_id: Option<i64>,
    image: Option<ImageUpload>,
    clear_image: bool,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    storage: Arc<UploadStorage>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        storage: Arc<UploadStorage>,
    ) -> Self {
        Self {
            posts,
            writer,
            groups,
            storage,
        }
    }

    pub async fn group_choices(&self) -> Result<Vec<GroupRecord>, RepoError> {
        self.groups.list_groups().await
    }

    pub async fn create(
        &self,
        author_id: i64,
        draft: PostDraft,
    ) -> Result<PostRecord, PostFormError> {
        let validated = self.validate(draft).await?;
        let image = match validated.image {
            Some(upload) => Some(self.store_image(upload).await?),
            None => None,
        };

        let post = self
            .writer
            .create_post(CreatePostParams {
                author_id,
                text: validated.text,
                group_id: validated.group_id,
                image,
            })
            .await?;

        info!(
            target = "yatube::posts",
            post_id = post.id,
            author_id,
            "post created"
        );
        Ok(post)
    }

    pub async fn edit_access(
        &self,
        post_id: i64,
        viewer_id: i64,
    ) -> Result<EditAccess, PostFormError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(PostFormError::UnknownPost(post_id))?;
        if post.author.id == viewer_id {
            Ok(EditAccess::Author(post))
        } else {
            Ok(EditAccess::NotAuthor(post))
        }
    }

    /// Apply an edit. Non-authors get `EditAccess::NotAuthor` back and nothing is written.
    pub async fn update(
        &self,
        post_id: i64,
        viewer_id: i64,
        draft: PostDraft,
    ) -> Result<EditAccess, PostFormError> {
        let existing = match self.edit_access(post_id, viewer_id).await? {
            EditAccess::Author(post) => post,
            denied @ EditAccess::NotAuthor(_) => {
                warn!(
                    target = "yatube::posts",
                    post_id, viewer_id, "edit attempted by non-author"
                );
                return Ok(denied);
            }
        };

        let validated = self.validate(draft).await?;
        let image = match (validated.image, validated.clear_image) {
            (Some(upload), _) => Some(self.store_image(upload).await?),
            (None, true) => None,
            (None, false) => existing.image.clone(),
        };

        let updated = self
            .writer
            .update_post(UpdatePostParams {
                id: existing.id,
                text: validated.text,
                group_id: validated.group_id,
                image,
            })
            .await?;

        info!(target = "yatube::posts", post_id, "post updated");
        Ok(EditAccess::Author(updated))
    }

    async fn validate(&self, draft: PostDraft) -> Result<ValidatedDraft, PostFormError> {
        let mut errors = PostFormErrors::default();

        let text = match normalize_required_text("text", &draft.text) {
            Ok(text) => Some(text),
            Err(DomainError::Validation { message, .. }) => {
                errors.text = Some(message);
                None
            }
        };

        let group_id = match draft
            .group
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            None => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => match self.groups.find_by_id(id).await? {
                    Some(group) => Some(group.id),
                    None => {
                        errors.group = Some(INVALID_GROUP_MESSAGE.to_string());
                        None
                    }
                },
                Err(_) => {
                    errors.group = Some(INVALID_GROUP_MESSAGE.to_string());
                    None
                }
            },
        };

        if let Some(upload) = draft.image.as_ref()
            && let Err(message) = check_image(&upload.bytes)
        {
            errors.image = Some(message.to_string());
        }

        match text {
            Some(text) if errors.is_empty() => Ok(ValidatedDraft {
                text,
                group_id,
                image: draft.image,
                clear_image: draft.clear_image,
            }),
            _ => Err(PostFormError::Invalid(errors)),
        }
    }

    async fn store_image(&self, upload: ImageUpload) -> Result<String, PostFormError> {
        let stored_path = self
            .storage
            .store(POST_IMAGE_DIRECTORY, &upload.filename, upload.bytes)
            .await?;
        Ok(stored_path)
    }
}

fn check_image(bytes: &[u8]) -> Result<(), &'static str> {
    if bytes.is_empty() {
        return Err(EMPTY_IMAGE_MESSAGE);
    }
    match imagesize::blob_size(bytes) {
        Ok(size) if size.width > 0 && size.height > 0 => Ok(()),
        _ => Err(INVALID_IMAGE_MESSAGE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GIF: &[u8] = &[
        0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
        0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
    ];

    #[test]
    fn gif_bytes_pass_image_check() {
        assert!(check_image(SMALL_GIF).is_ok());
    }

    #[test]
    fn text_bytes_fail_image_check() {
        assert_eq!(check_image(b"not an image"), Err(INVALID_IMAGE_MESSAGE));
        assert_eq!(check_image(b""), Err(EMPTY_IMAGE_MESSAGE));
    }

    #[test]
    fn empty_error_set() {
        assert!(PostFormErrors::default().is_empty());
        let errors = PostFormErrors {
            group: Some(INVALID_GROUP_MESSAGE.to_string()),
            ..Default::default()
        };
        assert!(!errors.is_empty());
    }
}
