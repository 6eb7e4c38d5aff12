use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::{GroupListing, PostDetail, ProfileListing};
use crate::application::pagination::Page;
use crate::application::posts::PostFormErrors;
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, "Страница не найдена", ErrorPageView::not_found());
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct ViewerView {
    pub username: String,
}

#[derive(Clone)]
pub struct FooterView {
    pub year: i32,
}

#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub viewer: Option<ViewerView>,
    pub footer: FooterView,
}

/// Page wrapper handed to every template that extends `base.html`.
#[derive(Clone)]
pub struct LayoutContext<T> {
    pub title: String,
    pub brand: BrandView,
    pub is_authenticated: bool,
    pub viewer_username: String,
    pub footer: FooterView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, title: impl Into<String>, content: T) -> Self {
        let (is_authenticated, viewer_username) = match chrome.viewer {
            Some(viewer) => (true, viewer.username),
            None => (false, String::new()),
        };
        Self {
            title: title.into(),
            brand: chrome.brand,
            is_authenticated,
            viewer_username,
            footer: chrome.footer,
            content,
        }
    }
}

const MONTHS_GENITIVE: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// `18 октября 2026`
pub fn format_date(value: OffsetDateTime) -> String {
    let month = MONTHS_GENITIVE[usize::from(u8::from(value.month())) - 1];
    format!("{} {} {}", value.day(), month, value.year())
}

pub fn media_url(stored_path: &str) -> String {
    format!("/media/{stored_path}")
}

#[derive(Clone)]
pub struct PostCardView {
    pub id: i64,
    pub text: String,
    pub published: String,
    pub author_username: String,
    pub author_name: String,
    pub has_group: bool,
    pub group_title: String,
    pub group_slug: String,
    pub has_image: bool,
    pub image_url: String,
}

impl From<&PostRecord> for PostCardView {
    fn from(post: &PostRecord) -> Self {
        let (group_title, group_slug) = post
            .group
            .as_ref()
            .map(|group| (group.title.clone(), group.slug.clone()))
            .unwrap_or_default();
        Self {
            id: post.id,
            text: post.text.clone(),
            published: format_date(post.pub_date),
            author_username: post.author.username.clone(),
            author_name: post.author.display_name(),
            has_group: post.group.is_some(),
            group_title,
            group_slug,
            has_image: post.image.is_some(),
            image_url: post.image.as_deref().map(media_url).unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct PaginatorView {
    pub number: u32,
    pub num_pages: u32,
    pub has_previous: bool,
    pub previous_number: u32,
    pub has_next: bool,
    pub next_number: u32,
}

impl PaginatorView {
    pub fn from_page<T>(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            num_pages: page.num_pages,
            has_previous: page.has_previous(),
            previous_number: page.previous_page_number().unwrap_or(1),
            has_next: page.has_next(),
            next_number: page.next_page_number().unwrap_or(page.num_pages),
        }
    }

    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

fn post_cards(page: &Page<PostRecord>) -> Vec<PostCardView> {
    page.items.iter().map(PostCardView::from).collect()
}

pub struct ListingView {
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
}

impl ListingView {
    pub fn from_page(page: &Page<PostRecord>) -> Self {
        Self {
            posts: post_cards(page),
            paginator: PaginatorView::from_page(page),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<ListingView>,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowFeedTemplate {
    pub view: LayoutContext<ListingView>,
}

pub struct GroupPageView {
    pub title: String,
    pub description: String,
    pub listing: ListingView,
}

impl From<&GroupListing> for GroupPageView {
    fn from(listing: &GroupListing) -> Self {
        Self {
            title: listing.group.title.clone(),
            description: listing.group.description.clone().unwrap_or_default(),
            listing: ListingView::from_page(&listing.page),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupPageView>,
}

pub struct ProfileView {
    pub username: String,
    pub display_name: String,
    pub posts_count: u64,
    pub following: bool,
    pub show_follow_controls: bool,
    pub listing: ListingView,
}

impl ProfileView {
    pub fn page_title(username: &str) -> String {
        format!("Профайл пользователя {username}")
    }

    pub fn new(listing: &ProfileListing, viewer_id: Option<i64>) -> Self {
        Self {
            username: listing.author.username.clone(),
            display_name: listing.author.summary().display_name(),
            posts_count: listing.posts_count,
            following: listing.following,
            show_follow_controls: viewer_id.is_some_and(|id| id != listing.author.id),
            listing: ListingView::from_page(&listing.page),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileView>,
}

#[derive(Clone)]
pub struct CommentView {
    pub author_username: String,
    pub author_name: String,
    pub text: String,
    pub created: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            author_username: comment.author.username.clone(),
            author_name: comment.author.display_name(),
            text: comment.text.clone(),
            created: format_date(comment.created),
        }
    }
}

pub struct PostDetailView {
    pub post: PostCardView,
    pub author_posts_count: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
    pub can_comment: bool,
}

impl PostDetailView {
    pub fn new(detail: &PostDetail, viewer_id: Option<i64>) -> Self {
        Self {
            post: PostCardView::from(&detail.post),
            author_posts_count: detail.author_posts_count,
            comments: detail.comments.iter().map(CommentView::from).collect(),
            can_edit: viewer_id == Some(detail.post.author.id),
            can_comment: viewer_id.is_some(),
        }
    }

    /// First thirty characters of the post, used as the page title.
    pub fn page_title(post: &PostRecord) -> String {
        post.text.chars().take(30).collect()
    }
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

#[derive(Clone)]
pub struct GroupOptionView {
    pub id: i64,
    pub title: String,
    pub selected: bool,
}

pub struct PostFormView {
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub no_group_selected: bool,
    pub has_current_image: bool,
    pub current_image_url: String,
    pub text_error: String,
    pub group_error: String,
    pub image_error: String,
}

impl PostFormView {
    pub fn create(groups: &[GroupRecord]) -> Self {
        Self::build(false, "/create/".to_string(), "", None, groups, None)
    }

    pub fn edit(post: &PostRecord, groups: &[GroupRecord]) -> Self {
        let group_id = post.group.as_ref().map(|group| group.id.to_string());
        Self::build(
            true,
            format!("/posts/{}/edit/", post.id),
            &post.text,
            group_id.as_deref(),
            groups,
            post.image.as_deref(),
        )
    }

    /// Re-render a submitted form with its field errors.
    pub fn with_errors(mut self, errors: &PostFormErrors) -> Self {
        self.text_error = errors.text.clone().unwrap_or_default();
        self.group_error = errors.group.clone().unwrap_or_default();
        self.image_error = errors.image.clone().unwrap_or_default();
        self
    }

    pub fn build(
        is_edit: bool,
        action: String,
        text: &str,
        selected_group: Option<&str>,
        groups: &[GroupRecord],
        current_image: Option<&str>,
    ) -> Self {
        let selected_group = selected_group.map(str::trim).filter(|value| !value.is_empty());
        let groups = groups
            .iter()
            .map(|group| GroupOptionView {
                id: group.id,
                title: group.title.clone(),
                selected: selected_group == Some(group.id.to_string().as_str()),
            })
            .collect::<Vec<_>>();
        Self {
            is_edit,
            action,
            text: text.to_string(),
            no_group_selected: !groups.iter().any(|group| group.selected),
            groups,
            has_current_image: current_image.is_some(),
            current_image_url: current_image.map(media_url).unwrap_or_default(),
            text_error: String::new(),
            group_error: String::new(),
            image_error: String::new(),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub view: LayoutContext<PostFormView>,
}

pub struct LoginView {
    pub username: String,
    pub next: String,
    pub error: String,
}

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

pub struct ErrorPageView {
    pub heading: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            heading: "Ошибка 404".to_string(),
            message: "Страница не найдена. Вернитесь на главную.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
