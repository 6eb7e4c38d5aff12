//! In-memory persistence and router wiring shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use http_body_util::BodyExt;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;
use uuid::Uuid;

use yatube::{
    application::{
        auth::{AuthService, RegisterUser},
        chrome::ChromeService,
        comments::CommentService,
        feed::FeedService,
        follows::FollowService,
        pagination::PageWindow,
        posts::PostService,
        repos::{
            CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
            CreateSessionParams, CreateUserParams, FollowsRepo, GroupsRepo, PostScope, PostsRepo,
            PostsWriteRepo, RepoError, SessionsRepo, UpdatePostParams, UsersRepo,
        },
    },
    cache::{CacheConfig, CacheState},
    domain::entities::{
        CommentRecord, FollowRecord, GroupRecord, GroupSummary, PostRecord, SessionRecord,
        UserRecord,
    },
    infra::{
        http::{DatabaseHealth, HttpState, SESSION_COOKIE, build_router},
        uploads::UploadStorage,
    },
};

pub const PASSWORD: &str = "war-and-peace-1869";

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<StoredPost>,
    comments: Vec<StoredComment>,
    follows: Vec<FollowRecord>,
    sessions: Vec<SessionRecord>,
    next_id: i64,
}

#[derive(Clone)]
struct StoredPost {
    id: i64,
    text: String,
    pub_date: OffsetDateTime,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
}

#[derive(Clone)]
struct StoredComment {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    created: OffsetDateTime,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: i64) -> Option<&UserRecord> {
        self.users.iter().find(|user| user.id == id)
    }

    fn hydrate(&self, post: &StoredPost) -> Result<PostRecord, RepoError> {
        let author = self
            .user(post.author_id)
            .ok_or_else(|| RepoError::Integrity {
                message: format!("post {} has no author", post.id),
            })?
            .summary();
        let group = post
            .group_id
            .and_then(|id| self.groups.iter().find(|group| group.id == id))
            .map(GroupSummary::from);
        Ok(PostRecord {
            id: post.id,
            text: post.text.clone(),
            pub_date: post.pub_date,
            author,
            group,
            image: post.image.clone(),
        })
    }

    fn in_scope(&self, post: &StoredPost, scope: PostScope) -> bool {
        match scope {
            PostScope::All => true,
            PostScope::Group(id) => post.group_id == Some(id),
            PostScope::Author(id) => post.author_id == id,
            PostScope::FollowedBy(user_id) => self
                .follows
                .iter()
                .any(|edge| edge.user_id == user_id && edge.author_id == post.author_id),
        }
    }
}

/// Every repository trait backed by one mutex-guarded set of tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut guard = self.tables.lock().expect("store lock poisoned");
        f(&mut guard)
    }

    pub fn add_group(&self, title: &str, slug: &str) -> GroupRecord {
        self.with_tables(|tables| {
            let group = GroupRecord {
                id: tables.next_id(),
                title: title.to_string(),
                slug: slug.to_string(),
                description: Some(format!("Записи о {title}")),
            };
            tables.groups.push(group.clone());
            group
        })
    }

    /// Insert a post directly, bypassing the form. Later posts get later dates.
    pub fn add_post(&self, author_id: i64, text: &str, group_id: Option<i64>) -> i64 {
        self.with_tables(|tables| {
            let id = tables.next_id();
            tables.posts.push(StoredPost {
                id,
                text: text.to_string(),
                pub_date: OffsetDateTime::now_utc() + Duration::seconds(id),
                author_id,
                group_id,
                image: None,
            });
            id
        })
    }

    /// Change a post's text behind the application's back.
    pub fn set_post_text(&self, post_id: i64, text: &str) {
        self.with_tables(|tables| {
            if let Some(post) = tables.posts.iter_mut().find(|post| post.id == post_id) {
                post.text = text.to_string();
            }
        })
    }

    pub fn post(&self, post_id: i64) -> Option<PostRecord> {
        self.with_tables(|tables| {
            tables
                .posts
                .iter()
                .find(|post| post.id == post_id)
                .and_then(|post| tables.hydrate(post).ok())
        })
    }

    pub fn latest_post(&self) -> Option<PostRecord> {
        self.with_tables(|tables| {
            tables
                .posts
                .iter()
                .max_by_key(|post| post.id)
                .and_then(|post| tables.hydrate(post).ok())
        })
    }

    pub fn post_count(&self) -> usize {
        self.with_tables(|tables| tables.posts.len())
    }

    pub fn comment_count(&self, post_id: i64) -> usize {
        self.with_tables(|tables| {
            tables
                .comments
                .iter()
                .filter(|comment| comment.post_id == post_id)
                .count()
        })
    }

    pub fn follow_count(&self) -> usize {
        self.with_tables(|tables| tables.follows.len())
    }

    pub fn has_follow(&self, user_id: i64, author_id: i64) -> bool {
        self.with_tables(|tables| {
            tables
                .follows
                .iter()
                .any(|edge| edge.user_id == user_id && edge.author_id == author_id)
        })
    }

    pub fn session_count(&self) -> usize {
        self.with_tables(|tables| tables.sessions.len())
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        Ok(self.with_tables(|tables| {
            tables
                .posts
                .iter()
                .filter(|post| tables.in_scope(post, scope))
                .count() as u64
        }))
    }

    async fn list_posts(
        &self,
        scope: PostScope,
        window: PageWindow,
    ) -> Result<Vec<PostRecord>, RepoError> {
        self.with_tables(|tables| {
            let mut posts: Vec<&StoredPost> = tables
                .posts
                .iter()
                .filter(|post| tables.in_scope(post, scope))
                .collect();
            posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
            posts
                .into_iter()
                .skip(window.offset as usize)
                .take(window.limit as usize)
                .map(|post| tables.hydrate(post))
                .collect()
        })
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        self.with_tables(|tables| {
            tables
                .posts
                .iter()
                .find(|post| post.id == id)
                .map(|post| tables.hydrate(post))
                .transpose()
        })
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        self.with_tables(|tables| {
            let id = tables.next_id();
            let post = StoredPost {
                id,
                text: params.text,
                pub_date: OffsetDateTime::now_utc() + Duration::seconds(id),
                author_id: params.author_id,
                group_id: params.group_id,
                image: params.image,
            };
            tables.posts.push(post.clone());
            tables.hydrate(&post)
        })
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        self.with_tables(|tables| {
            let post = tables
                .posts
                .iter_mut()
                .find(|post| post.id == params.id)
                .ok_or(RepoError::NotFound)?;
            post.text = params.text;
            post.group_id = params.group_id;
            post.image = params.image;
            let post = post.clone();
            tables.hydrate(&post)
        })
    }
}

#[async_trait]
impl GroupsRepo for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.with_tables(|tables| {
            tables.groups.iter().find(|group| group.slug == slug).cloned()
        }))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self.with_tables(|tables| tables.groups.iter().find(|group| group.id == id).cloned()))
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        Ok(self.with_tables(|tables| {
            let mut groups = tables.groups.clone();
            groups.sort_by(|a, b| a.title.cmp(&b.title));
            groups
        }))
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        self.with_tables(|tables| {
            if tables.groups.iter().any(|group| group.slug == params.slug) {
                return Err(RepoError::Duplicate {
                    constraint: "groups_slug_key".to_string(),
                });
            }
            let group = GroupRecord {
                id: tables.next_id(),
                title: params.title,
                slug: params.slug,
                description: params.description,
            };
            tables.groups.push(group.clone());
            Ok(group)
        })
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.with_tables(|tables| {
            tables
                .users
                .iter()
                .find(|user| user.username == username)
                .cloned()
        }))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.with_tables(|tables| tables.user(id).cloned()))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        self.with_tables(|tables| {
            if tables
                .users
                .iter()
                .any(|user| user.username == params.username)
            {
                return Err(RepoError::Duplicate {
                    constraint: "users_username_key".to_string(),
                });
            }
            let user = UserRecord {
                id: tables.next_id(),
                username: params.username,
                first_name: params.first_name,
                last_name: params.last_name,
                email: params.email,
                password_hash: params.password_hash,
                date_joined: OffsetDateTime::now_utc(),
            };
            tables.users.push(user.clone());
            Ok(user)
        })
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        self.with_tables(|tables| {
            tables
                .comments
                .iter()
                .filter(|comment| comment.post_id == post_id)
                .map(|comment| {
                    let author = tables
                        .user(comment.author_id)
                        .ok_or(RepoError::NotFound)?
                        .summary();
                    Ok(CommentRecord {
                        id: comment.id,
                        post_id: comment.post_id,
                        author,
                        text: comment.text.clone(),
                        created: comment.created,
                    })
                })
                .collect()
        })
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        self.with_tables(|tables| {
            let author = tables
                .user(params.author_id)
                .ok_or_else(|| RepoError::InvalidInput {
                    message: "unknown comment author".to_string(),
                })?
                .summary();
            let comment = StoredComment {
                id: tables.next_id(),
                post_id: params.post_id,
                author_id: params.author_id,
                text: params.text,
                created: OffsetDateTime::now_utc(),
            };
            tables.comments.push(comment.clone());
            Ok(CommentRecord {
                id: comment.id,
                post_id: comment.post_id,
                author,
                text: comment.text,
                created: comment.created,
            })
        })
    }
}

#[async_trait]
impl FollowsRepo for MemoryStore {
    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        Ok(self.has_follow(user_id, author_id))
    }

    async fn create_follow(&self, user_id: i64, author_id: i64) -> Result<bool, RepoError> {
        self.with_tables(|tables| {
            if user_id == author_id {
                return Err(RepoError::Integrity {
                    message: "users cannot follow themselves".to_string(),
                });
            }
            if tables
                .follows
                .iter()
                .any(|edge| edge.user_id == user_id && edge.author_id == author_id)
            {
                return Ok(false);
            }
            let id = tables.next_id();
            tables.follows.push(FollowRecord {
                id,
                user_id,
                author_id,
            });
            Ok(true)
        })
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> Result<u64, RepoError> {
        Ok(self.with_tables(|tables| {
            let before = tables.follows.len();
            tables
                .follows
                .retain(|edge| !(edge.user_id == user_id && edge.author_id == author_id));
            (before - tables.follows.len()) as u64
        }))
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        Ok(self.with_tables(|tables| {
            let session = SessionRecord {
                id: Uuid::new_v4(),
                user_id: params.user_id,
                prefix: params.prefix,
                hashed_secret: params.hashed_secret,
                created_at: OffsetDateTime::now_utc(),
                expires_at: params.expires_at,
            };
            tables.sessions.push(session.clone());
            session
        }))
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self.with_tables(|tables| {
            tables
                .sessions
                .iter()
                .find(|session| session.prefix == prefix)
                .cloned()
        }))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), RepoError> {
        self.with_tables(|tables| tables.sessions.retain(|session| session.prefix != prefix));
        Ok(())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        Ok(self.with_tables(|tables| {
            let before = tables.sessions.len();
            tables.sessions.retain(|session| session.expires_at > now);
            (before - tables.sessions.len()) as u64
        }))
    }
}

struct HealthyDatabase;

#[async_trait]
impl DatabaseHealth for HealthyDatabase {
    async fn check(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

/// A fully wired application over `MemoryStore`.
pub struct TestApp {
    pub store: MemoryStore,
    pub router: Router,
    pub cache: Option<CacheState>,
    pub auth: Arc<AuthService>,
    _uploads: tempfile::TempDir,
}

pub struct TestAppBuilder {
    cache_enabled: bool,
    page_size: u32,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self {
            cache_enabled: false,
            page_size: 10,
        }
    }
}

impl TestAppBuilder {
    pub fn with_cache(mut self) -> Self {
        self.cache_enabled = true;
        self
    }

    pub fn build(self) -> TestApp {
        let store = MemoryStore::default();
        let repo = Arc::new(store.clone());
        let uploads = tempfile::tempdir().expect("upload tempdir");
        let storage = Arc::new(
            UploadStorage::new(uploads.path().to_path_buf()).expect("upload storage"),
        );
        let page_size = std::num::NonZeroU32::new(self.page_size).expect("non-zero page size");

        let auth = Arc::new(AuthService::new(
            repo.clone(),
            repo.clone(),
            std::time::Duration::from_secs(3600),
        ));
        let cache = self.cache_enabled.then(|| {
            CacheState::new(CacheConfig {
                enabled: true,
                index_ttl: std::time::Duration::from_secs(20),
                key_prefix: "index_page".to_string(),
                response_limit: 200,
                max_body_bytes: 1024 * 1024,
            })
        });

        let state = HttpState {
            feed: Arc::new(FeedService::new(
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                repo.clone(),
                page_size,
            )),
            posts: Arc::new(PostService::new(
                repo.clone(),
                repo.clone(),
                repo.clone(),
                storage.clone(),
            )),
            comments: Arc::new(CommentService::new(repo.clone(), repo.clone())),
            follows: Arc::new(FollowService::new(repo.clone(), repo.clone())),
            auth: auth.clone(),
            chrome: Arc::new(ChromeService::new("Yatube")),
            upload_storage: storage,
            db: Arc::new(HealthyDatabase),
            cache: cache.clone(),
            upload_limit: 10 * 1024 * 1024,
            secure_cookies: false,
        };

        TestApp {
            store,
            router: build_router(state),
            cache,
            auth,
            _uploads: uploads,
        }
    }
}

impl TestApp {
    pub fn new() -> Self {
        TestAppBuilder::default().build()
    }

    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    /// Register a user through the auth service.
    pub async fn create_user(&self, username: &str) -> UserRecord {
        self.auth
            .register(RegisterUser {
                username: username.to_string(),
                password: PASSWORD.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: format!("{username}@example.com"),
            })
            .await
            .expect("register user")
    }

    /// A `Cookie` header value carrying a fresh session for `user`.
    pub async fn session_cookie(&self, user: &UserRecord) -> String {
        let issued = self.auth.start_session(user).await.expect("start session");
        format!("{SESSION_COOKIE}={}", issued.token)
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).expect("request"))
            .await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, form: &str) -> Response<Body> {
        let mut request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(form.to_string())).expect("request"))
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: Option<&str>,
        form: MultipartForm,
    ) -> Response<Body> {
        let mut request = Request::post(uri).header(header::CONTENT_TYPE, form.content_type());
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(form.finish())).expect("request"))
            .await
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Number of post cards rendered on a listing page.
pub fn card_count(body: &str) -> usize {
    body.matches("class=\"post-card\"").count()
}

const BOUNDARY: &str = "yatube-test-boundary";

/// Minimal `multipart/form-data` body builder.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub const SMALL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00, 0x00, 0x00,
    0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];
