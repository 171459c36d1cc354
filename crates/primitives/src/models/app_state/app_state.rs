use diesel::r2d2::{self, ConnectionManager};
use diesel::PgConnection;
use lapin::Channel;
use redis::aio::ConnectionManager as RedisConnectionManager;
use std::sync::Arc;

use crate::models::app_state::app_config::AppConfig;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Process-scoped collaborators, constructed once at startup and passed
/// explicitly. Cloning is cheap: the pool, the redis manager and the AMQP
/// channel are all handles.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub redis: RedisConnectionManager,
    pub amqp: Channel,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        db: DbPool,
        redis: RedisConnectionManager,
        amqp: Channel,
        config: AppConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            redis,
            amqp,
            config,
        })
    }
}
