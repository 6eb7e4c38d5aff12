//! Read-side listings: home, group, profile, follow feed and post detail.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;

use crate::application::error::{HttpError, repo_error_to_http};
use crate::application::pagination::{Page, Paginator, RequestedPage};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord, UserRecord};

const SOURCE: &str = "application::feed::FeedService";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error("unknown author `{0}`")]
    UnknownAuthor(String),
    #[error("unknown post {0}")]
    UnknownPost(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl FeedError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FeedError::UnknownGroup(_) | FeedError::UnknownAuthor(_) | FeedError::UnknownPost(_)
        )
    }
}

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        match error {
            FeedError::UnknownGroup(_) | FeedError::UnknownAuthor(_) | FeedError::UnknownPost(_) => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
            FeedError::Repo(err) => repo_error_to_http(SOURCE, err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupListing {
    pub group: GroupRecord,
    pub page: Page<PostRecord>,
}

#[derive(Debug, Clone)]
pub struct ProfileListing {
    pub author: UserRecord,
    pub page: Page<PostRecord>,
    pub posts_count: u64,
    /// Whether the viewer follows this author; always false for anonymous viewers.
    pub following: bool,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
    pub author_posts_count: u64,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
    page_size: NonZeroU32,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
        page_size: NonZeroU32,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            comments,
            follows,
            page_size,
        }
    }

    /// Paginate one post scope. Every listing goes through here.
    pub async fn paginate(
        &self,
        scope: PostScope,
        requested: RequestedPage,
    ) -> Result<Page<PostRecord>, FeedError> {
        let total = self.posts.count_posts(scope).await?;
        let paginator = Paginator::new(total, self.page_size);
        let number = paginator.resolve(requested);
        let items = if total == 0 {
            Vec::new()
        } else {
            self.posts
                .list_posts(scope, paginator.window(number))
                .await?
        };
        Ok(paginator.page(number, items))
    }

    pub async fn index(&self, requested: RequestedPage) -> Result<Page<PostRecord>, FeedError> {
        self.paginate(PostScope::All, requested).await
    }

    pub async fn group(
        &self,
        slug: &str,
        requested: RequestedPage,
    ) -> Result<GroupListing, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::UnknownGroup(slug.to_string()))?;
        let page = self.paginate(PostScope::Group(group.id), requested).await?;
        Ok(GroupListing { group, page })
    }

    pub async fn profile(
        &self,
        username: &str,
        viewer_id: Option<i64>,
        requested: RequestedPage,
    ) -> Result<ProfileListing, FeedError> {
        let author = self.find_author(username).await?;
        let page = self.paginate(PostScope::Author(author.id), requested).await?;
        let following = match viewer_id {
            Some(viewer_id) => self.follows.is_following(viewer_id, author.id).await?,
            None => false,
        };
        Ok(ProfileListing {
            posts_count: page.total_count,
            author,
            page,
            following,
        })
    }

    pub async fn follow_feed(
        &self,
        viewer_id: i64,
        requested: RequestedPage,
    ) -> Result<Page<PostRecord>, FeedError> {
        self.paginate(PostScope::FollowedBy(viewer_id), requested)
            .await
    }

    pub async fn post_detail(&self, post_id: i64) -> Result<PostDetail, FeedError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or(FeedError::UnknownPost(post_id))?;
        let comments = self.comments.list_for_post(post.id).await?;
        let author_posts_count = self
            .posts
            .count_posts(PostScope::Author(post.author.id))
            .await?;
        Ok(PostDetail {
            post,
            comments,
            author_posts_count,
        })
    }

    async fn find_author(&self, username: &str) -> Result<UserRecord, FeedError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| FeedError::UnknownAuthor(username.to_string()))
    }
}
