use payrail_primitives::error::ApiError;
use redis::aio::ConnectionManager;
use redis::Script;
use std::time::Duration;
use uuid::Uuid;

/// Per-resource mutual exclusion over redis. A lock is a `lock:{resource}`
/// key holding a random fencing token with a PX expiry; only the holder of
/// the matching token may release or extend it, so an expired holder can
/// never stomp its successor.
pub struct LockService;

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
else
    return 0
end"#;

impl LockService {
    fn key(resource: &str) -> String {
        format!("lock:{}", resource)
    }

    fn new_token() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Single acquisition attempt. Returns the fencing token on success,
    /// `None` when the lock is already held.
    pub async fn acquire(
        redis: &ConnectionManager,
        resource: &str,
        ttl_ms: u64,
    ) -> Result<Option<String>, ApiError> {
        let token = Self::new_token();
        let mut con = redis.clone();

        let reply: Option<String> = redis::cmd("SET")
            .arg(Self::key(resource))
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut con)
            .await?;

        Ok(reply.map(|_| token))
    }

    /// Linear-backoff acquisition: `base_delay × attempt` between attempts.
    /// `None` after exhaustion; callers surface that as a concurrency
    /// conflict.
    pub async fn acquire_with_retry(
        redis: &ConnectionManager,
        resource: &str,
        ttl_ms: u64,
        attempts: u32,
        base_delay_ms: u64,
    ) -> Result<Option<String>, ApiError> {
        for attempt in 1..=attempts.max(1) {
            if let Some(token) = Self::acquire(redis, resource, ttl_ms).await? {
                return Ok(Some(token));
            }
            if attempt < attempts {
                tokio::time::sleep(Duration::from_millis(base_delay_ms * attempt as u64)).await;
            }
        }
        Ok(None)
    }

    /// Compare-and-delete. Never removes a lock held under a different
    /// token. Returns whether this call released the lock.
    pub async fn release(
        redis: &ConnectionManager,
        resource: &str,
        token: &str,
    ) -> Result<bool, ApiError> {
        let mut con = redis.clone();
        let removed: i64 = Script::new(RELEASE_SCRIPT)
            .key(Self::key(resource))
            .arg(token)
            .invoke_async(&mut con)
            .await?;
        Ok(removed == 1)
    }

    /// Compare-and-pexpire, for settlements outrunning the original TTL.
    pub async fn extend(
        redis: &ConnectionManager,
        resource: &str,
        token: &str,
        ttl_ms: u64,
    ) -> Result<bool, ApiError> {
        let mut con = redis.clone();
        let extended: i64 = Script::new(EXTEND_SCRIPT)
            .key(Self::key(resource))
            .arg(token)
            .arg(ttl_ms)
            .invoke_async(&mut con)
            .await?;
        Ok(extended == 1)
    }
}
