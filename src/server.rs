//! HTTP server initialization and runtime setup.
//!
//! Handles database connections, cache and event channel setup, consumer
//! startup, and the Axum server lifecycle including graceful shutdown.

use crate::application::services::UrlService;
use crate::config::Config;
use crate::infrastructure::cache::{CacheService, NullCache, RedisCache};
use crate::infrastructure::events::{
    ConnectionState, EventChannel, RedisConnector, start_default_consumers,
};
use crate::infrastructure::persistence::PgUrlRepository;
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on waiting for outstanding cache writes and publishes at shutdown.
const EFFECTS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Redis cache (or NullCache fallback)
/// - Event channel and its logging consumers
/// - Axum HTTP server
///
/// On Ctrl+C the server stops accepting requests, the event channel shuts
/// down and outstanding side effects are drained.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let cache: Arc<dyn CacheService> = if let Some(redis_url) = &config.redis_url {
        match RedisCache::connect(redis_url, config.cache_ttls()).await {
            Ok(redis) => {
                tracing::info!("Cache enabled (Redis)");
                Arc::new(redis)
            }
            Err(e) => {
                tracing::warn!("Failed to connect to Redis: {}. Using NullCache.", e);
                Arc::new(NullCache::new())
            }
        }
    } else {
        tracing::info!("Cache disabled (NullCache)");
        Arc::new(NullCache::new())
    };

    let events = build_event_channel(&config).await;

    let repository = Arc::new(PgUrlRepository::new(Arc::new(pool)));
    let url_service = Arc::new(
        UrlService::new(repository, cache, events, &config.base_url)
            .with_code_length(config.short_code_length),
    );

    let state = AppState::new(Arc::clone(&url_service));
    let app = app_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("HTTP server stopped");

    url_service.shutdown(EFFECTS_DRAIN_TIMEOUT).await;

    Ok(())
}

/// Creates the event channel and starts connecting it.
///
/// Without an events URL the channel is disabled. A broker that is down at
/// startup does not block the server: the channel keeps reconnecting in the
/// background and consumers start once it is connected.
async fn build_event_channel(config: &Config) -> EventChannel {
    let Some(events_url) = &config.events_url else {
        tracing::info!("Event channel disabled");
        return EventChannel::disabled();
    };

    let connector = match RedisConnector::new(events_url) {
        Ok(connector) => connector,
        Err(e) => {
            tracing::warn!("Invalid events URL: {}. Event channel disabled.", e);
            return EventChannel::disabled();
        }
    };

    let events = EventChannel::new(Arc::new(connector), config.event_channel_config());
    if !events.connect().await {
        tracing::warn!("Event broker unavailable at startup, reconnecting in background");
    }

    if config.events_consumers {
        let channel = events.clone();
        tokio::spawn(async move {
            let mut state = channel.subscribe_state();
            if state
                .wait_for(|s| *s == ConnectionState::Connected)
                .await
                .is_ok()
            {
                let started = start_default_consumers(&channel);
                tracing::info!("Started {} event consumers", started);
            }
        });
    }

    events
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
