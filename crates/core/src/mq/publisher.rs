use crate::mq::topology::PAYOUT_QUEUE;
use lapin::options::BasicPublishOptions;
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable};
use lapin::BasicProperties;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::app_state::AppState;
use payrail_primitives::models::dtos::envelope::SettlementEnvelope;
use tracing::debug;

/// Durable enqueue of settlement work. The broker-level message id is the
/// transaction id, and `x-retry-count` starts at zero so the consumer's
/// requeue policy can count redeliveries it re-publishes itself.
pub struct Publisher;

impl Publisher {
    pub async fn publish(state: &AppState, envelope: &SettlementEnvelope) -> Result<(), ApiError> {
        Self::publish_with_retry_count(state, envelope, 0).await
    }

    pub async fn publish_with_retry_count(
        state: &AppState,
        envelope: &SettlementEnvelope,
        retry_count: i64,
    ) -> Result<(), ApiError> {
        let payload = serde_json::to_vec(envelope)?;

        let mut headers = FieldTable::default();
        headers.insert("x-retry-count".into(), AMQPValue::LongLongInt(retry_count));

        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(2) // persistent
            .with_message_id(envelope.transaction_id.clone().into())
            .with_headers(headers);

        let confirm = state
            .amqp
            .basic_publish(
                "",
                PAYOUT_QUEUE,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await?;

        if state.config.publisher_confirms {
            let confirmation = confirm.await?;
            if let Confirmation::Nack(_) = confirmation {
                return Err(ApiError::Queue(format!(
                    "broker refused publish of {}",
                    envelope.transaction_id
                )));
            }
        }

        debug!(
            transaction_id = %envelope.transaction_id,
            retry_count,
            "Settlement envelope published"
        );

        Ok(())
    }
}
