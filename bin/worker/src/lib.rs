// Library entry point for the worker binary; exposed so integration tests
// can drive the same bootstrap the binary uses.

pub mod reaper;

use eyre::Report;
use payrail_core::bootstrap::{
    connect_amqp, create_db_pool, create_redis_client, create_redis_manager, load_env,
    setup_logging,
};
use payrail_core::mq::consumer::PayoutConsumer;
use payrail_core::mq::topology;
use payrail_primitives::models::app_state::app_config::AppConfig;
use payrail_primitives::models::app_state::AppState;
use tracing::{info, warn};

pub async fn run() -> Result<(), Report> {
    // 1. Initialize logging first (so we can log everything else)
    setup_logging();

    info!("Starting payrail worker...");

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

    // 7. Start the stale-processing reaper
    reaper::spawn_reaper(state.clone());

    // 8. Consume until the shutdown signal, then drain
    PayoutConsumer::run(state).await?;

    // 9. Close broker connection last
    if let Err(e) = amqp_connection.close(200, "worker shutdown").await {
        warn!(error = %e, "AMQP connection close failed");
    }

    info!("payrail worker shut down gracefully");
    Ok(())
}
