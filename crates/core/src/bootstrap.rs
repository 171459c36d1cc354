//! Process bootstrap shared by the gateway and worker binaries: logging,
//! environment, connection pools and the shutdown signal.

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use eyre::Report;
use lapin::{Channel, Connection, ConnectionProperties};
use payrail_primitives::models::app_state::app_config::AppConfig;
use payrail_primitives::models::app_state::DbPool;
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::io::{stdout, IsTerminal};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// The default filter keeps the money path at `info` while silencing the
/// AMQP client's per-frame chatter; RUST_LOG overrides everything.
const DEFAULT_LOG_FILTER: &str = "info,lapin=warn";

pub fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // human-readable on a terminal, JSON lines for log shippers otherwise
    if stdout().is_terminal() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    }

    info!("tracing initialized");
}

pub fn load_env() {
    if dotenvy::dotenv().is_ok() {
        info!("Loaded environment from .env");
    }
}

/// Both processes are I/O-bound with bounded concurrency: HTTP intake on
/// the gateway, `WORKER_CONCURRENCY` settlements plus the reaper on the
/// worker. A small pool covers that; the 5s checkout timeout matches the
/// store-selection deadline the pipeline budgets per external call.
const DB_POOL_SIZE: u32 = 20;

pub fn create_db_pool() -> Result<DbPool, Report> {
    let database_url = SecretString::new(Box::from(
        env::var("DATABASE_URL").map_err(|_| eyre::eyre!("DATABASE_URL must be set"))?,
    ));

    let pool = Pool::builder()
        .max_size(DB_POOL_SIZE)
        .min_idle(Some(2))
        .connection_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(600)))
        .test_on_check_out(true)
        .build(ConnectionManager::<PgConnection>::new(
            database_url.expose_secret(),
        ))?;

    info!(max_size = DB_POOL_SIZE, "database pool ready");

    Ok(pool)
}

pub fn create_redis_client(config: &AppConfig) -> Result<redis::Client, Report> {
    let client = redis::Client::open(config.redis_url.as_str())?;
    Ok(client)
}

pub async fn create_redis_manager(
    client: &redis::Client,
) -> Result<redis::aio::ConnectionManager, Report> {
    let manager = client.get_connection_manager().await?;
    info!("Redis connection established");
    Ok(manager)
}

/// One AMQP connection per process; callers keep the connection alive for
/// the channel's lifetime.
pub async fn connect_amqp(config: &AppConfig) -> Result<(Connection, Channel), Report> {
    let connection = Connection::connect(
        &config.amqp_url,
        ConnectionProperties::default().with_connection_name("payrail".into()),
    )
    .await?;
    let channel = connection.create_channel().await?;

    info!("RabbitMQ connection established");

    Ok((connection, channel))
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
