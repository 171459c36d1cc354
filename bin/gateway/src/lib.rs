// Library entry point for the gateway binary; exposed so integration tests
// can drive the same bootstrap the binary uses.

use eyre::Report;
use payrail_api::app::create_router;
use payrail_api::ws::{run_event_bridge, SessionRegistry};
use payrail_core::bootstrap::{
    connect_amqp, create_db_pool, create_redis_client, create_redis_manager, load_env,
    setup_logging, shutdown_signal,
};
use payrail_core::mq::topology;
use payrail_primitives::models::app_state::app_config::AppConfig;
use payrail_primitives::models::app_state::AppState;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run() -> Result<(), Report> {
    // 1. Initialize logging first (so we can log everything else)
    setup_logging();

    info!("Starting payrail gateway...");

    // 2. Load environment variables
    load_env();

    // 3. Load configuration
    let config = AppConfig::from_env()?;

    // 4. Create connection pools and clients
    let pool = create_db_pool()?;
    let redis_client = create_redis_client(&config)?;
    let redis = create_redis_manager(&redis_client).await?;
    let (amqp_connection, channel) = connect_amqp(&config).await?;

    // 5. Declare the settlement topology (idempotent)
    topology::declare(&channel).await?;

    // 6. Build application state
    let state = AppState::new(pool, redis, channel, config);

    // 7. Start the cross-instance event bridge for this instance's sessions
    let sessions = Arc::new(SessionRegistry::default());
    tokio::spawn(run_event_bridge(redis_client, sessions.clone()));

    // 8. Build Axum router
    let app = create_router(state, sessions);

    // 9. Serve HTTP until the shutdown signal fires. ConnectInfo feeds the
    //    per-IP limiter and request metadata, so the make-service variant
    //    that carries peer addresses is required.
    let ip: IpAddr = std::env::var("HOST")
        .unwrap_or_else(|_| "0.0.0.0".to_string())
        .parse()?;
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;
    let addr = SocketAddr::new(ip, port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway accepting payout traffic");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // 10. Close broker connection last
    if let Err(e) = amqp_connection.close(200, "gateway shutdown").await {
        warn!(error = %e, "AMQP connection close failed");
    }

    info!("payrail gateway shut down gracefully");
    Ok(())
}
