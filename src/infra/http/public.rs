use std::{io::ErrorKind, sync::Arc};

use axum::{
    Form, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::Multipart;
use bytes::Bytes;
use serde::Deserialize;
use tracing::error;
use url::form_urlencoded;

use crate::{
    application::{
        auth::{AuthService, Principal},
        chrome::ChromeService,
        comments::{CommentError, CommentService},
        error::{ErrorReport, HttpError},
        feed::{FeedError, FeedService},
        follows::{FollowError, FollowService},
        pagination::RequestedPage,
        posts::{EditAccess, ImageUpload, PostDraft, PostFormError, PostService},
    },
    cache::{CacheState, response_cache_layer},
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        FollowFeedTemplate, GroupPageView, GroupTemplate,
        IndexTemplate, LayoutChrome, LayoutContext, ListingView, PostDetailTemplate,
        PostDetailView, PostFormTemplate, PostFormView, ProfileTemplate, ProfileView,
        render_not_found_response, render_template_response,
    },
};

use super::{
    DatabaseHealth,
    auth::{RequireUser, Viewer, login_page, login_submit, logout},
    db_health_response,
    middleware::{log_responses, resolve_session, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub follows: Arc<FollowService>,
    pub auth: Arc<AuthService>,
    pub chrome: Arc<ChromeService>,
    pub upload_storage: Arc<UploadStorage>,
    pub db: Arc<dyn DatabaseHealth>,
    pub cache: Option<CacheState>,
    /// Request body ceiling for the post forms.
    pub upload_limit: usize,
    pub secure_cookies: bool,
}

pub fn build_router(state: HttpState) -> Router {
    // Only the home listing is cached; the cache key includes the viewer.
    let cached_routes = Router::new().route("/", get(index));
    let cached_routes = if let Some(cache_state) = state.cache.clone() {
        cached_routes.layer(middleware::from_fn_with_state(
            cache_state,
            response_cache_layer,
        ))
    } else {
        cached_routes
    };

    let form_routes = Router::new()
        .route("/create/", get(create_form).post(create_submit))
        .route("/posts/{post_id}/edit/", get(edit_form).post(edit_submit))
        .layer(DefaultBodyLimit::max(state.upload_limit));

    let routes = Router::new()
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route(
            "/profile/{username}/follow/",
            get(profile_follow).post(profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(profile_unfollow).post(profile_unfollow),
        )
        .route("/posts/{post_id}/", get(post_detail))
        .route("/posts/{post_id}/comment/", get(comment_get).post(add_comment))
        .route("/follow/", get(follow_index))
        .route("/auth/login/", get(login_page).post(login_submit))
        .route("/auth/logout/", get(logout).post(logout))
        .route("/media/{*path}", get(serve_upload))
        .route("/_health/db", get(public_health));

    cached_routes
        .merge(form_routes)
        .merge(routes)
        .fallback(fallback)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_session))
        .layer(middleware::from_fn(set_request_context))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn requested(&self) -> RequestedPage {
        RequestedPage::parse(self.page.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentForm {
    text: String,
}

fn chrome_for(state: &HttpState, viewer: Option<&Principal>) -> LayoutChrome {
    state.chrome.load(viewer)
}

fn profile_path(username: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(username.as_bytes()).collect();
    format!("/profile/{encoded}/")
}

fn post_path(post_id: i64) -> String {
    format!("/posts/{post_id}/")
}

fn not_found(state: &HttpState, viewer: Option<&Principal>) -> Response {
    render_not_found_response(chrome_for(state, viewer))
}

fn feed_error_to_response(err: FeedError, state: &HttpState, viewer: Option<&Principal>) -> Response {
    if err.is_not_found() {
        let mut response = not_found(state, viewer);
        ErrorReport::from_error(
            "infra::http::feed_error_to_response",
            StatusCode::NOT_FOUND,
            &err,
        )
        .attach(&mut response);
        return response;
    }
    HttpError::from(err).into_response()
}

async fn index(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.index(query.requested()).await {
        Ok(page) => {
            let chrome = chrome_for(&state, viewer.as_ref());
            let view = LayoutContext::new(
                chrome,
                "Последние обновления на сайте",
                ListingView::from_page(&page),
            );
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, &state, viewer.as_ref()),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state.feed.group(&slug, query.requested()).await {
        Ok(listing) => {
            let chrome = chrome_for(&state, viewer.as_ref());
            let title = format!("Записи сообщества {}", listing.group.title);
            let view = LayoutContext::new(chrome, title, GroupPageView::from(&listing));
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, &state, viewer.as_ref()),
    }
}

async fn profile(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let viewer_id = viewer.as_ref().map(|principal| principal.user_id);
    match state
        .feed
        .profile(&username, viewer_id, query.requested())
        .await
    {
        Ok(listing) => {
            let chrome = chrome_for(&state, viewer.as_ref());
            let title = ProfileView::page_title(&listing.author.username);
            let view = LayoutContext::new(chrome, title, ProfileView::new(&listing, viewer_id));
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, &state, viewer.as_ref()),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(raw_id): Path<String>,
) -> Response {
    let Ok(post_id) = raw_id.parse::<i64>() else {
        return not_found(&state, viewer.as_ref());
    };
    let viewer_id = viewer.as_ref().map(|principal| principal.user_id);

    match state.feed.post_detail(post_id).await {
        Ok(detail) => {
            let chrome = chrome_for(&state, viewer.as_ref());
            let title = PostDetailView::page_title(&detail.post);
            let view = LayoutContext::new(chrome, title, PostDetailView::new(&detail, viewer_id));
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, &state, viewer.as_ref()),
    }
}

async fn comment_get(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path(raw_id): Path<String>,
) -> Response {
    match raw_id.parse::<i64>() {
        Ok(post_id) => Redirect::to(&post_path(post_id)).into_response(),
        Err(_) => not_found(&state, Some(&principal)),
    }
}

async fn add_comment(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path(raw_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let Ok(post_id) = raw_id.parse::<i64>() else {
        return not_found(&state, Some(&principal));
    };

    match state
        .comments
        .add_comment(post_id, principal.user_id, &form.text)
        .await
    {
        Ok(_) => Redirect::to(&post_path(post_id)).into_response(),
        Err(CommentError::UnknownPost(_)) => not_found(&state, Some(&principal)),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn follow_index(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Query(query): Query<PageQuery>,
) -> Response {
    match state
        .feed
        .follow_feed(principal.user_id, query.requested())
        .await
    {
        Ok(page) => {
            let chrome = chrome_for(&state, Some(&principal));
            let view = LayoutContext::new(
                chrome,
                "Избранные авторы",
                ListingView::from_page(&page),
            );
            render_template_response(FollowFeedTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, &state, Some(&principal)),
    }
}

async fn profile_follow(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.follow(principal.user_id, &username).await {
        Ok(_) => Redirect::to(&profile_path(&username)).into_response(),
        Err(FollowError::UnknownAuthor(_)) => not_found(&state, Some(&principal)),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn profile_unfollow(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path(username): Path<String>,
) -> Response {
    match state.follows.unfollow(principal.user_id, &username).await {
        Ok(_) => Redirect::to(&profile_path(&username)).into_response(),
        Err(FollowError::UnknownAuthor(_)) => not_found(&state, Some(&principal)),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn create_form(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
) -> Response {
    match state.posts.group_choices().await {
        Ok(groups) => render_post_form(&state, &principal, PostFormView::create(&groups)),
        Err(err) => HttpError::from(PostFormError::from(err)).into_response(),
    }
}

async fn create_submit(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    multipart: Multipart,
) -> Response {
    let draft = match read_post_draft(multipart).await {
        Ok(draft) => draft,
        Err(err) => return err.into_response(),
    };
    let submitted_text = draft.text.clone();
    let submitted_group = draft.group.clone();

    match state.posts.create(principal.user_id, draft).await {
        Ok(_) => Redirect::to(&profile_path(&principal.username)).into_response(),
        Err(PostFormError::Invalid(errors)) => {
            let groups = match state.posts.group_choices().await {
                Ok(groups) => groups,
                Err(err) => return HttpError::from(PostFormError::from(err)).into_response(),
            };
            let form = PostFormView::build(
                false,
                "/create/".to_string(),
                &submitted_text,
                submitted_group.as_deref(),
                &groups,
                None,
            )
            .with_errors(&errors);
            render_post_form(&state, &principal, form)
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn edit_form(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path(raw_id): Path<String>,
) -> Response {
    let Ok(post_id) = raw_id.parse::<i64>() else {
        return not_found(&state, Some(&principal));
    };

    match state.posts.edit_access(post_id, principal.user_id).await {
        Ok(EditAccess::Author(post)) => match state.posts.group_choices().await {
            Ok(groups) => render_post_form(&state, &principal, PostFormView::edit(&post, &groups)),
            Err(err) => HttpError::from(PostFormError::from(err)).into_response(),
        },
        Ok(EditAccess::NotAuthor(post)) => Redirect::to(&post_path(post.id)).into_response(),
        Err(PostFormError::UnknownPost(_)) => not_found(&state, Some(&principal)),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn edit_submit(
    State(state): State<HttpState>,
    RequireUser(principal): RequireUser,
    Path(raw_id): Path<String>,
    multipart: Multipart,
) -> Response {
    let Ok(post_id) = raw_id.parse::<i64>() else {
        return not_found(&state, Some(&principal));
    };
    let draft = match read_post_draft(multipart).await {
        Ok(draft) => draft,
        Err(err) => return err.into_response(),
    };
    let submitted_text = draft.text.clone();
    let submitted_group = draft.group.clone();

    match state.posts.update(post_id, principal.user_id, draft).await {
        Ok(EditAccess::Author(post)) | Ok(EditAccess::NotAuthor(post)) => {
            Redirect::to(&post_path(post.id)).into_response()
        }
        Err(PostFormError::Invalid(errors)) => {
            let existing = match state.posts.edit_access(post_id, principal.user_id).await {
                Ok(EditAccess::Author(post)) | Ok(EditAccess::NotAuthor(post)) => post,
                Err(err) => return HttpError::from(err).into_response(),
            };
            let groups = match state.posts.group_choices().await {
                Ok(groups) => groups,
                Err(err) => return HttpError::from(PostFormError::from(err)).into_response(),
            };
            let form = PostFormView::build(
                true,
                format!("/posts/{post_id}/edit/"),
                &submitted_text,
                submitted_group.as_deref(),
                &groups,
                existing.image.as_deref(),
            )
            .with_errors(&errors);
            render_post_form(&state, &principal, form)
        }
        Err(PostFormError::UnknownPost(_)) => not_found(&state, Some(&principal)),
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn render_post_form(state: &HttpState, principal: &Principal, form: PostFormView) -> Response {
    let title = if form.is_edit {
        "Редактировать пост"
    } else {
        "Новый пост"
    };
    let chrome = chrome_for(state, Some(principal));
    let view = LayoutContext::new(chrome, title, form);
    render_template_response(PostFormTemplate { view }, StatusCode::OK)
}

/// Collect the multipart post form. A file part without a name or bytes means "no upload".
async fn read_post_draft(mut multipart: Multipart) -> Result<PostDraft, HttpError> {
    const SOURCE: &str = "infra::http::public::read_post_draft";

    let mut draft = PostDraft::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return Err(HttpError::new(
                    SOURCE,
                    StatusCode::BAD_REQUEST,
                    "Malformed form submission",
                    err.to_string(),
                ));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|err| {
            HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Malformed form submission",
                err.to_string(),
            )
        })?;

        match name.as_str() {
            "text" => draft.text = String::from_utf8_lossy(&bytes).into_owned(),
            "group" => draft.group = Some(String::from_utf8_lossy(&bytes).into_owned()),
            "image-clear" => draft.clear_image = !bytes.is_empty(),
            "image" => {
                let filename = filename.unwrap_or_default();
                if !filename.is_empty() || !bytes.is_empty() {
                    draft.image = Some(ImageUpload { filename, bytes });
                }
            }
            _ => {}
        }
    }

    Ok(draft)
}

async fn serve_upload(
    State(state): State<HttpState>,
    Viewer(viewer): Viewer,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_upload";

    match state.upload_storage.read(&path).await {
        Ok(bytes) => build_upload_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => not_found(&state, viewer.as_ref()),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            not_found(&state, viewer.as_ref())
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read uploaded file",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(axum::body::Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.check().await)
}

async fn fallback(State(state): State<HttpState>, Viewer(viewer): Viewer) -> Response {
    not_found(&state, viewer.as_ref())
}
