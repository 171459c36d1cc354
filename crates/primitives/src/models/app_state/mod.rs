pub mod app_config;
pub mod app_state;

pub use app_config::AppConfig;
pub use app_state::{AppState, DbPool};
