use payrail_primitives::error::ApiError;
use redis::aio::ConnectionManager;
use redis::Script;

/// Fixed-window counters in redis. The first hit of a window sets the
/// expiry; every caller gets the current count and remaining window back in
/// one round trip.
pub struct RateLimiter;

#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

const WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
return {count, ttl}"#;

impl RateLimiter {
    pub fn ip_key(ip: &str) -> String {
        format!("rl:{}", ip)
    }

    pub fn user_key(key: &str) -> String {
        format!("rl:user:{}", key)
    }

    pub async fn check(
        redis: &ConnectionManager,
        key: &str,
        window_ms: u64,
        max_requests: u32,
    ) -> Result<RateDecision, ApiError> {
        let mut con = redis.clone();
        let (count, ttl_ms): (i64, i64) = Script::new(WINDOW_SCRIPT)
            .key(key)
            .arg(window_ms)
            .invoke_async(&mut con)
            .await?;

        Ok(RateDecision {
            allowed: count <= max_requests as i64,
            retry_after_secs: Self::retry_after_secs(ttl_ms),
        })
    }

    fn retry_after_secs(ttl_ms: i64) -> u64 {
        // ceil to whole seconds; a key without expiry reports -1
        (ttl_ms.max(0) as u64).div_ceil(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(RateLimiter::ip_key("10.0.0.1"), "rl:10.0.0.1");
        assert_eq!(RateLimiter::user_key("user_001"), "rl:user:user_001");
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(RateLimiter::retry_after_secs(0), 0);
        assert_eq!(RateLimiter::retry_after_secs(1), 1);
        assert_eq!(RateLimiter::retry_after_secs(1000), 1);
        assert_eq!(RateLimiter::retry_after_secs(59_001), 60);
        assert_eq!(RateLimiter::retry_after_secs(-1), 0);
    }
}
