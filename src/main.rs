use std::{future::IntoFuture, process, sync::Arc};

use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        auth::{AuthService, RegisterUser},
        chrome::ChromeService,
        comments::CommentService,
        error::AppError,
        feed::FeedService,
        follows::FollowService,
        groups::{CreateGroupCommand, GroupService},
        posts::PostService,
    },
    cache::{CacheConfig, CacheState},
    config::{self, CreateGroupArgs, CreateUserArgs},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::UploadStorage,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;
    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::CreateUser(args) => run_create_user(settings, args).await,
        config::Command::CreateGroup(args) => run_create_group(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let http_state = build_http_state(repositories, &settings)?;

    match http_state.auth.purge_expired_sessions().await {
        Ok(0) => {}
        Ok(purged) => info!(target = "yatube::startup", purged, "expired sessions removed"),
        Err(err) => warn!(
            target = "yatube::startup",
            error = %err,
            "failed to purge expired sessions"
        ),
    }

    serve_http(&settings, http_state).await
}

async fn run_create_user(
    settings: config::Settings,
    args: CreateUserArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let auth = AuthService::new(
        repositories.clone(),
        repositories,
        settings.auth.session_ttl,
    );

    let user = auth
        .register(RegisterUser {
            username: args.username,
            password: args.password,
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
        })
        .await
        .map_err(|err| AppError::validation(format!("failed to create user: {err}")))?;

    info!(
        target = "yatube::cli",
        user_id = user.id,
        username = %user.username,
        "user created"
    );
    Ok(())
}

async fn run_create_group(
    settings: config::Settings,
    args: CreateGroupArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let groups = GroupService::new(repositories);

    let group = groups
        .create(CreateGroupCommand {
            title: args.title,
            slug: args.slug,
            description: args.description,
        })
        .await
        .map_err(|err| AppError::validation(format!("failed to create group: {err}")))?;

    info!(
        target = "yatube::cli",
        group_id = group.id,
        slug = %group.slug,
        "group created"
    );
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<HttpState, AppError> {
    let upload_storage = UploadStorage::new(settings.uploads.directory.clone())
        .map_err(|err| AppError::from(InfraError::upload_root(&settings.uploads.directory, err)))?;
    let upload_storage = Arc::new(upload_storage);

    let feed = FeedService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        settings.pagination.page_size,
    );
    let posts = PostService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        upload_storage.clone(),
    );
    let comments = CommentService::new(repositories.clone(), repositories.clone());
    let follows = FollowService::new(repositories.clone(), repositories.clone());
    let auth = AuthService::new(
        repositories.clone(),
        repositories.clone(),
        settings.auth.session_ttl,
    );

    let cache = settings
        .cache
        .enabled
        .then(|| CacheState::new(CacheConfig::from(&settings.cache)));

    Ok(HttpState {
        feed: Arc::new(feed),
        posts: Arc::new(posts),
        comments: Arc::new(comments),
        follows: Arc::new(follows),
        auth: Arc::new(auth),
        chrome: Arc::new(ChromeService::new(settings.site.brand_title.clone())),
        upload_storage,
        db: repositories,
        cache,
        upload_limit: usize::try_from(settings.uploads.max_request_bytes.get())
            .unwrap_or(usize::MAX),
        secure_cookies: settings.auth.secure_cookies,
    })
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "yatube::startup",
        addr = %settings.server.addr,
        "listening for http requests"
    );

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .into_future();

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        shutdown.notified().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = deadline => {
            warn!(
                target = "yatube::shutdown",
                grace_seconds = grace.as_secs(),
                "in-flight requests did not finish in time; exiting"
            );
        }
    }

    info!(target = "yatube::shutdown", "server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "yatube::shutdown", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "yatube::shutdown", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!(target = "yatube::shutdown", "shutdown signal received; draining connections");
    shutdown.notify_one();
}
