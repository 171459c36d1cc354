use eyre::Report;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub redis_url: String,
    pub amqp_url: String,

    pub lock_ttl_ms: u64,
    pub lock_retry_count: u32,
    pub lock_retry_delay_ms: u64,

    pub worker_concurrency: u16,
    pub max_retry_attempts: u32,
    pub retry_delay_ms: u64,

    pub max_payout_amount: f64,
    pub min_payout_amount: f64,

    pub rate_limit_window_ms: u64,
    pub rate_limit_max_requests: u32,
    pub user_rate_limit_window_ms: u64,
    pub user_rate_limit_max_requests: u32,

    pub publisher_confirms: bool,

    pub stale_processing_max_age_ms: u64,
    pub reaper_interval_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, Report> {
        Ok(Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            amqp_url: env::var("AMQP_URL")
                .unwrap_or_else(|_| "amqp://127.0.0.1:5672/%2f".into()),

            lock_ttl_ms: parse_env("LOCK_TTL_MS", 30_000)?,
            lock_retry_count: parse_env("LOCK_RETRY_COUNT", 3)?,
            lock_retry_delay_ms: parse_env("LOCK_RETRY_DELAY_MS", 100)?,

            worker_concurrency: parse_env("WORKER_CONCURRENCY", 5)?,
            max_retry_attempts: parse_env("MAX_RETRY_ATTEMPTS", 3)?,
            retry_delay_ms: parse_env("RETRY_DELAY_MS", 1_000)?,

            max_payout_amount: parse_env("MAX_PAYOUT_AMOUNT", 10_000.0)?,
            min_payout_amount: parse_env("MIN_PAYOUT_AMOUNT", 0.01)?,

            rate_limit_window_ms: parse_env("RATE_LIMIT_WINDOW_MS", 60_000)?,
            rate_limit_max_requests: parse_env("RATE_LIMIT_MAX_REQUESTS", 100)?,
            user_rate_limit_window_ms: parse_env("USER_RATE_LIMIT_WINDOW_MS", 60_000)?,
            user_rate_limit_max_requests: parse_env("USER_RATE_LIMIT_MAX_REQUESTS", 10)?,

            publisher_confirms: parse_env("PUBLISHER_CONFIRMS", false)?,

            stale_processing_max_age_ms: parse_env("STALE_PROCESSING_MAX_AGE_MS", 300_000)?,
            reaper_interval_ms: parse_env("REAPER_INTERVAL_MS", 60_000)?,
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, Report>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| eyre::eyre!("invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_knobs() {
        // Only read keys that the test environment does not set.
        let config = AppConfig::from_env().unwrap();

        assert_eq!(config.lock_ttl_ms, 30_000);
        assert_eq!(config.lock_retry_count, 3);
        assert_eq!(config.worker_concurrency, 5);
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.user_rate_limit_max_requests, 10);
        assert_eq!(config.min_payout_amount, 0.01);
        assert!(!config.publisher_confirms);
    }
}
