use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use yatube::{
    application::{
        context::{Repositories, Services},
        error::AppError,
        groups::CreateGroupCommand,
    },
    cache::{CacheConfig, CacheState, INDEX_PAGE_PREFIX, PageCache, spawn_sweeper},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::InMemoryRepositories,
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
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::CreateUser(args) => run_create_user(settings, args).await,
        config::Command::CreateGroup(args) => run_create_group(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let uploads = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::from(err)))?,
    );
    let services = Services::new(&repositories, uploads.clone());

    let cache_config = CacheConfig::from(&settings.cache);
    let page_cache = Arc::new(PageCache::new(&cache_config));
    let sweep_interval = cache_config.sweep_interval;
    let cache_state = CacheState::new(cache_config, page_cache.clone(), INDEX_PAGE_PREFIX);

    let upload_body_limit = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes exceeds usize"))?;
    let http_state = HttpState::new(&services, uploads, cache_state, upload_body_limit);

    let sweeper = spawn_sweeper(page_cache, sweep_interval);

    let result = serve_http(&settings, http_state).await;

    sweeper.abort();
    let _ = sweeper.await;

    result
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let url = require_database_url(&settings, "migrate")?;
    let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "yatube::migrate", "migrations applied");
    Ok(())
}

async fn run_create_user(
    settings: config::Settings,
    args: config::CreateUserArgs,
) -> Result<(), AppError> {
    require_database_url(&settings, "create-user")?;
    let repositories = init_repositories(&settings).await?;
    let users = yatube::application::users::UserService::new(repositories.users);

    let user = users.create_user(&args.username).await.map_err(|err| {
        AppError::validation(format!("failed to create user `{}`: {err}", args.username))
    })?;
    info!(
        target = "yatube::create_user",
        user_id = user.id,
        username = %user.username,
        "user created"
    );
    Ok(())
}

async fn run_create_group(
    settings: config::Settings,
    args: config::CreateGroupArgs,
) -> Result<(), AppError> {
    require_database_url(&settings, "create-group")?;
    let repositories = init_repositories(&settings).await?;
    let groups = yatube::application::groups::GroupService::new(repositories.groups);

    let group = groups
        .create(CreateGroupCommand {
            title: args.title,
            slug: args.slug,
            description: args.description,
        })
        .await
        .map_err(|err| AppError::validation(format!("failed to create group: {err}")))?;
    info!(
        target = "yatube::create_group",
        group_id = group.id,
        slug = %group.slug,
        "group created"
    );
    Ok(())
}

fn require_database_url<'a>(
    settings: &'a config::Settings,
    command: &str,
) -> Result<&'a str, AppError> {
    settings.database.url.as_deref().ok_or_else(|| {
        AppError::validation(format!("`{command}` requires database.url to be configured"))
    })
}

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    match settings.database.url.as_deref() {
        Some(url) => {
            let pool = PostgresRepositories::connect(url, settings.database.max_connections.get())
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            let store = Arc::new(PostgresRepositories::new(pool));
            store
                .health_check()
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            Ok(Repositories::from_store(store))
        }
        None => {
            warn!(
                target = "yatube::storage",
                "database.url not set; data lives in memory and is lost on exit"
            );
            Ok(Repositories::from_store(Arc::new(
                InMemoryRepositories::new(),
            )))
        }
    }
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "yatube::serve", addr = %settings.server.addr, "listening");

    let draining = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let draining = draining.clone();
        async move {
            shutdown_signal().await;
            draining.notify_one();
        }
    })
    .into_future();

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = drain_deadline(draining, grace) => {
            warn!(
                target = "yatube::serve",
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out"
            );
        }
    }

    Ok(())
}

async fn drain_deadline(draining: Arc<Notify>, grace: Duration) {
    draining.notified().await;
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "yatube::serve", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "yatube::serve", "shutdown signal received");
}
