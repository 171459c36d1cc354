use payrail_primitives::error::ApiError;
use payrail_primitives::models::dtos::envelope::EventEnvelope;
use payrail_primitives::models::entities::enum_types::PayoutEvent;
use redis::aio::ConnectionManager;
use tracing::warn;

/// Channel every gateway instance subscribes to. Instances that do not own
/// a session for the envelope's user drop the message.
pub const EVENTS_CHANNEL: &str = "websocket:events";

/// Producer half of the cross-instance event fan-out. The subscriber half
/// lives with the gateway's session registry.
pub struct EventBridge;

impl EventBridge {
    pub async fn publish(
        redis: &ConnectionManager,
        envelope: &EventEnvelope,
    ) -> Result<(), ApiError> {
        let payload = serde_json::to_string(envelope)?;
        let mut con = redis.clone();

        let _receivers: i64 = redis::cmd("PUBLISH")
            .arg(EVENTS_CHANNEL)
            .arg(payload)
            .query_async(&mut con)
            .await?;

        Ok(())
    }

    pub async fn emit(
        redis: &ConnectionManager,
        user_id: &str,
        event: PayoutEvent,
        data: serde_json::Value,
    ) -> Result<(), ApiError> {
        let envelope = EventEnvelope::new(user_id, event, data);
        Self::publish(redis, &envelope).await
    }

    /// Status events are best-effort: a lost event never aborts the money
    /// path that produced it.
    pub async fn emit_quietly(
        redis: &ConnectionManager,
        user_id: &str,
        event: PayoutEvent,
        data: serde_json::Value,
    ) {
        if let Err(e) = Self::emit(redis, user_id, event, data).await {
            warn!(user_id = %user_id, event = %event, error = %e, "failed to publish status event");
        }
    }
}
