pub mod app_state;
pub mod dtos;
pub mod entities;

pub use app_state::app_config::AppConfig;
pub use app_state::app_state::{AppState, DbPool};
