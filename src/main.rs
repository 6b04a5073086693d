use std::{net::SocketAddr, process, sync::Arc};

use bistro::{
    application::{
        error::AppError,
        menu::MenuService,
        orders::OrderService,
        repos::{HealthRepo, MenuRepo, OrdersRepo, TablesRepo},
        tables::TableService,
    },
    cache::{CacheConfig, CacheLayer, KvBackend, RedisBackend},
    config::{self, CacheCommand, Command, RedisSettings},
    domain::orders::DEFAULT_TABLES,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState, RateLimitPolicy},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

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
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::Cache(args) => run_cache(settings, args.command).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache = build_cache_layer(&settings)?;

    if cache.admin.is_available().await {
        info!(target: "bistro::startup", "Redis is available");
    } else {
        warn!(
            target: "bistro::startup",
            "Redis is unavailable; serving without cache until it recovers"
        );
    }

    let state = build_api_state(repositories, cache, &settings);
    serve_http(&settings, state).await
}

/// `cache info` and `cache clear` only need Redis.
async fn run_cache(settings: config::Settings, command: CacheCommand) -> Result<(), AppError> {
    if !settings.redis.enabled {
        return Err(AppError::validation(
            "the cache is disabled; enable redis to inspect or clear it",
        ));
    }
    let cache = build_cache_layer(&settings)?;

    let output = match command {
        CacheCommand::Info => serde_json::to_string_pretty(&cache.admin.info().await),
        CacheCommand::Clear => serde_json::to_string_pretty(&cache.admin.clear_all().await),
    }
    .map_err(|err| AppError::unexpected(err.to_string()))?;

    println!("{output}");
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

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err)))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err)))?;

    let repositories = Arc::new(PostgresRepositories::new(pool));
    repositories
        .ensure_tables(DEFAULT_TABLES)
        .await
        .map_err(|err| AppError::from(InfraError::database(err)))?;

    Ok(repositories)
}

fn build_cache_layer(settings: &config::Settings) -> Result<CacheLayer, AppError> {
    let cache_config = CacheConfig::from(settings);
    if !settings.redis.enabled {
        info!(target: "bistro::startup", "Redis disabled by configuration");
        return Ok(CacheLayer::disabled(&cache_config));
    }

    let backend: Arc<dyn KvBackend> = Arc::new(open_redis(&settings.redis, &cache_config)?);
    Ok(CacheLayer::with_backend(backend, &cache_config))
}

fn open_redis(redis: &RedisSettings, cache_config: &CacheConfig) -> Result<RedisBackend, AppError> {
    RedisBackend::open(&redis.url, cache_config.connect_timeout)
        .map_err(|err| AppError::from(InfraError::from(err)))
}

fn build_api_state(
    repositories: Arc<PostgresRepositories>,
    cache: CacheLayer,
    settings: &config::Settings,
) -> ApiState {
    let menu_repo: Arc<dyn MenuRepo> = repositories.clone();
    let tables_repo: Arc<dyn TablesRepo> = repositories.clone();
    let orders_repo: Arc<dyn OrdersRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    ApiState {
        menu: Arc::new(MenuService::new(
            menu_repo,
            cache.dishes.clone(),
            cache.views.clone(),
        )),
        tables: Arc::new(TableService::new(tables_repo, cache.tables.clone())),
        orders: Arc::new(OrderService::new(
            orders_repo,
            cache.orders.clone(),
            cache.tables.clone(),
        )),
        health: health_repo,
        rate_limit: RateLimitPolicy::from(&settings.rate_limit),
        cache,
    }
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target: "bistro::startup",
        addr = %settings.server.addr,
        "Listening"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!(target: "bistro::shutdown", "Shutdown signal received");
}
