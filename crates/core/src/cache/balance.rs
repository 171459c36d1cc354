use payrail_primitives::error::ApiError;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

/// Authoritative pending balance, kept in `balance:{user_id}` as integer
/// minor units. All mutations are server-side scripts, so a deduction is a
/// single atomic step no matter how many workers race on it.
pub struct BalanceCache;

/// Result of an atomic deduction. `-1`/`-2` sentinels from the script map
/// here; callers must branch on this and never trust a prior advisory read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeductOutcome {
    /// New balance after the deduction, in minor units.
    Deducted(i64),
    NotFound,
    Insufficient,
}

const NOT_FOUND: i64 = -1;
const INSUFFICIENT: i64 = -2;

const DEDUCT_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
    return -1
end
current = tonumber(current)
local amount = tonumber(ARGV[1])
if current < amount then
    return -2
end
local balance = current - amount
redis.call('SET', KEYS[1], tostring(balance))
return balance"#;

const CREDIT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return -1
end
return redis.call('INCRBY', KEYS[1], ARGV[1])"#;

impl BalanceCache {
    fn key(user_id: &str) -> String {
        format!("balance:{}", user_id)
    }

    /// `None` means cold: the caller rehydrates from the durable balance.
    pub async fn get(redis: &ConnectionManager, user_id: &str) -> Result<Option<i64>, ApiError> {
        let mut con = redis.clone();
        let value: Option<i64> = con.get(Self::key(user_id)).await?;
        Ok(value)
    }

    /// Unconditional seed, used only on cold-miss rehydration.
    pub async fn set(redis: &ConnectionManager, user_id: &str, minor: i64) -> Result<(), ApiError> {
        let mut con = redis.clone();
        let _: () = con.set(Self::key(user_id), minor).await?;
        Ok(())
    }

    /// Atomic compare-and-deduct; non-negative by construction.
    pub async fn deduct(
        redis: &ConnectionManager,
        user_id: &str,
        amount: i64,
    ) -> Result<DeductOutcome, ApiError> {
        let mut con = redis.clone();
        let code: i64 = Script::new(DEDUCT_SCRIPT)
            .key(Self::key(user_id))
            .arg(amount)
            .invoke_async(&mut con)
            .await?;
        Ok(Self::outcome_from(code))
    }

    /// Atomic credit used by rollback. `None` when the key is absent.
    pub async fn add(
        redis: &ConnectionManager,
        user_id: &str,
        amount: i64,
    ) -> Result<Option<i64>, ApiError> {
        let mut con = redis.clone();
        let code: i64 = Script::new(CREDIT_SCRIPT)
            .key(Self::key(user_id))
            .arg(amount)
            .invoke_async(&mut con)
            .await?;

        if code == NOT_FOUND {
            Ok(None)
        } else {
            Ok(Some(code))
        }
    }

    /// Advisory pre-check only: admission may rely on it for fast rejection
    /// but the deduction script re-verifies.
    pub async fn has_sufficient(
        redis: &ConnectionManager,
        user_id: &str,
        amount: i64,
    ) -> Result<bool, ApiError> {
        Ok(Self::get(redis, user_id)
            .await?
            .map(|balance| balance >= amount)
            .unwrap_or(false))
    }

    fn outcome_from(code: i64) -> DeductOutcome {
        match code {
            NOT_FOUND => DeductOutcome::NotFound,
            INSUFFICIENT => DeductOutcome::Insufficient,
            balance => DeductOutcome::Deducted(balance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_keys_are_namespaced() {
        assert_eq!(BalanceCache::key("user_001"), "balance:user_001");
    }

    #[test]
    fn sentinels_map_to_outcomes() {
        assert_eq!(BalanceCache::outcome_from(-1), DeductOutcome::NotFound);
        assert_eq!(BalanceCache::outcome_from(-2), DeductOutcome::Insufficient);
        assert_eq!(
            BalanceCache::outcome_from(989_950),
            DeductOutcome::Deducted(989_950)
        );
        assert_eq!(BalanceCache::outcome_from(0), DeductOutcome::Deducted(0));
    }
}
