use crate::bootstrap::shutdown_signal;
use crate::mq::publisher::Publisher;
use crate::mq::topology::PAYOUT_QUEUE;
use crate::services::audit_service::AuditService;
use crate::services::settlement_service::SettlementService;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::BasicProperties;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::app_state::AppState;
use payrail_primitives::models::dtos::envelope::SettlementEnvelope;
use payrail_primitives::models::entities::enum_types::AuditAction;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

const CONSUMER_TAG: &str = "payrail-worker";

/// Bounded time to let in-flight settlements finish after a shutdown
/// signal; anything slower is redelivered by the broker.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// What the requeue policy does with a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequeueDecision {
    /// Let dead-letter routing carry the message to the DLQ.
    DeadLetter,
    /// Re-publish the same body with an incremented `x-retry-count` after
    /// the configured delay.
    Republish { next_retry_count: i64 },
}

/// Prefetch-bounded consume loop. The broker never hands this worker more
/// unacked messages than `WORKER_CONCURRENCY`; each delivery settles on its
/// own task.
pub struct PayoutConsumer;

impl PayoutConsumer {
    pub async fn run(state: Arc<AppState>) -> Result<(), ApiError> {
        state
            .amqp
            .basic_qos(state.config.worker_concurrency, BasicQosOptions::default())
            .await?;

        let mut consumer = state
            .amqp
            .basic_consume(
                PAYOUT_QUEUE,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(
            queue = PAYOUT_QUEUE,
            prefetch = state.config.worker_concurrency,
            "Consumer started"
        );

        let mut in_flight: JoinSet<()> = JoinSet::new();
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Stopping consumer, unacked messages will be redelivered");
                    if let Err(e) = state
                        .amqp
                        .basic_cancel(CONSUMER_TAG, BasicCancelOptions::default())
                        .await
                    {
                        warn!(error = %e, "basic.cancel failed during shutdown");
                    }
                    break;
                }
                delivery = consumer.next() => {
                    match delivery {
                        Some(Ok(delivery)) => {
                            let state = state.clone();
                            in_flight.spawn(async move {
                                Self::handle_delivery(state, delivery).await;
                            });
                        }
                        // break rather than bail so in-flight settlements
                        // drain before the channel goes away
                        Some(Err(e)) => {
                            error!(error = %e, "Consumer stream error");
                            break;
                        }
                        // server-initiated cancel or channel close
                        None => {
                            info!("Consumer stream closed by broker");
                            break;
                        }
                    }
                }
            }
        }

        let drain = async {
            while in_flight.join_next().await.is_some() {}
        };
        if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
            warn!("In-flight settlements did not drain within the grace period");
        }

        Ok(())
    }

    async fn handle_delivery(state: Arc<AppState>, delivery: Delivery) {
        let envelope: SettlementEnvelope = match serde_json::from_slice(&delivery.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                // unparseable body: straight to the DLQ, nothing to retry
                warn!(error = %e, "Dropping malformed settlement message");
                Self::nack_dead_letter(&delivery).await;
                return;
            }
        };

        let retry_count = retry_count_of(&delivery.properties);

        AuditService::record(
            &state,
            Some(&envelope.transaction_id),
            Some(&envelope.user_id),
            AuditAction::MessageConsumed,
            json!({ "retry_count": retry_count }),
        )
        .await;

        match SettlementService::process_payout(&state, &envelope).await {
            Ok(outcome) => {
                if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
                    error!(
                        transaction_id = %envelope.transaction_id,
                        error = %e,
                        "Failed to ack settled message"
                    );
                    return;
                }
                AuditService::record(
                    &state,
                    Some(&envelope.transaction_id),
                    Some(&envelope.user_id),
                    AuditAction::MessageAcked,
                    json!({ "outcome": format!("{:?}", outcome) }),
                )
                .await;
            }
            Err(err) => Self::handle_failure(&state, &delivery, &envelope, err, retry_count).await,
        }
    }

    async fn handle_failure(
        state: &Arc<AppState>,
        delivery: &Delivery,
        envelope: &SettlementEnvelope,
        err: ApiError,
        retry_count: i64,
    ) {
        let conflict = matches!(err, ApiError::AlreadyProcessing(_));
        let decision = decide(conflict, retry_count, state.config.max_retry_attempts);

        warn!(
            transaction_id = %envelope.transaction_id,
            error = %err,
            retry_count,
            ?decision,
            "Settlement failed"
        );

        Self::nack_dead_letter(delivery).await;

        AuditService::record(
            state,
            Some(&envelope.transaction_id),
            Some(&envelope.user_id),
            AuditAction::MessageNacked,
            json!({
                "error": err.to_string(),
                "code": err.code(),
                "retry_count": retry_count,
            }),
        )
        .await;

        if let RequeueDecision::Republish { next_retry_count } = decision {
            let state = state.clone();
            let envelope = envelope.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(state.config.retry_delay_ms)).await;
                if let Err(e) =
                    Publisher::publish_with_retry_count(&state, &envelope, next_retry_count).await
                {
                    error!(
                        transaction_id = %envelope.transaction_id,
                        error = %e,
                        "Failed to re-publish for retry, message stays dead-lettered"
                    );
                }
            });
        }
    }

    async fn nack_dead_letter(delivery: &Delivery) {
        let nack = BasicNackOptions {
            requeue: false,
            ..BasicNackOptions::default()
        };
        if let Err(e) = delivery.acker.nack(nack).await {
            error!(error = %e, "Failed to nack message");
        }
    }
}

/// `x-retry-count` of the delivery, zero when absent or of an unexpected
/// type.
fn retry_count_of(properties: &BasicProperties) -> i64 {
    properties
        .headers()
        .as_ref()
        .and_then(|headers| {
            headers
                .inner()
                .iter()
                .find(|(key, _)| key.as_str() == "x-retry-count")
                .map(|(_, value)| value)
        })
        .and_then(as_i64)
        .unwrap_or(0)
}

fn as_i64(value: &AMQPValue) -> Option<i64> {
    match value {
        AMQPValue::ShortShortInt(v) => Some(*v as i64),
        AMQPValue::ShortShortUInt(v) => Some(*v as i64),
        AMQPValue::ShortInt(v) => Some(*v as i64),
        AMQPValue::ShortUInt(v) => Some(*v as i64),
        AMQPValue::LongInt(v) => Some(*v as i64),
        AMQPValue::LongUInt(v) => Some(*v as i64),
        AMQPValue::LongLongInt(v) => Some(*v),
        _ => None,
    }
}

fn decide(conflict: bool, retry_count: i64, max_retries: u32) -> RequeueDecision {
    // ALREADY_PROCESSING never retries: redelivering cannot unpin a
    // transaction another settlement attempt owns.
    if conflict {
        return RequeueDecision::DeadLetter;
    }
    if retry_count < max_retries as i64 {
        RequeueDecision::Republish {
            next_retry_count: retry_count + 1,
        }
    } else {
        RequeueDecision::DeadLetter
    }
}
