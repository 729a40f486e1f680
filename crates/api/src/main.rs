use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidgit_api::config::{ServerConfig, StorageBackend};
use vidgit_api::{background, routes, state};
use vidgit_cache::{Cache, MemoryCache, NoopCache, RedisCache};
use vidgit_db::{DbPool, MemoryStore, PgStore, Store};
use vidgit_events::EventBus;

use state::AppState;

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "vidgit_api=debug,vidgit_pipeline=debug,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        storage = %config.storage_backend,
        "Loaded server configuration"
    );

    // --- Storage ---
    let (store, pool) = open_store(&config).await?;

    // --- Cache ---
    let cache = open_cache(&config).await;

    // --- CORS ---
    let cors = build_cors_layer(&config)?;

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    tracing::info!("Event bus created");

    // --- App state ---
    let state = AppState::new(config.clone(), store, pool, cache, Arc::clone(&event_bus));

    // --- Background consumers and stream bridge ---
    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();
    background::spawn_all(&state, &tracker, &cancel)?;

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let queue = Arc::clone(&state.queue);
    let app = Router::new()
        // Health check at root level (not under /api/v1).
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let drain_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    // Let queued changes finish so segments and history stay in step.
    if tokio::time::timeout(drain_timeout, queue.shutdown()).await.is_err() {
        tracing::warn!("Change queue did not drain before the shutdown timeout");
    }

    cancel.cancel();
    tracker.close();
    if tokio::time::timeout(drain_timeout, tracker.wait()).await.is_err() {
        tracing::warn!("Background consumers did not stop before the shutdown timeout");
    }
    tracing::info!("Background consumers stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

async fn open_store(config: &ServerConfig) -> Result<(Arc<dyn Store>, Option<DbPool>), BoxError> {
    match (config.storage_backend, config.database_url.as_deref()) {
        (StorageBackend::Postgres, Some(database_url)) => {
            let pool = vidgit_db::create_pool(database_url).await?;
            tracing::info!("Database connection pool created");

            vidgit_db::health_check(&pool).await?;
            tracing::info!("Database health check passed");

            vidgit_db::run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");

            let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
            Ok((store, Some(pool)))
        }
        (StorageBackend::Postgres, None) => {
            Err(vidgit_api::config::ConfigError::MissingDatabaseUrl.into())
        }
        (StorageBackend::Memory, _) => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
            Ok((store, None))
        }
    }
}

/// Connect to Redis when configured. The cache is best effort, so an
/// unreachable Redis degrades to no caching instead of failing startup.
async fn open_cache(config: &ServerConfig) -> Arc<dyn Cache> {
    let cache: Arc<dyn Cache> = match config.redis_url.as_deref() {
        Some(url) => match RedisCache::connect(url).await {
            Ok(cache) => {
                tracing::info!("Redis cache connected");
                Arc::new(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, running without a cache");
                Arc::new(NoopCache)
            }
        },
        None => {
            tracing::info!(
                capacity = config.cache_capacity,
                "REDIS_URL not set, using in-process cache"
            );
            Arc::new(MemoryCache::with_limits(config.cache_capacity, config.cache_ttl()))
        }
    };
    cache
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Fails startup if any configured origin is not a valid header value.
fn build_cors_layer(config: &ServerConfig) -> Result<CorsLayer, BoxError> {
    let origins = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| format!("Invalid CORS origin '{o}': {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600)))
}
