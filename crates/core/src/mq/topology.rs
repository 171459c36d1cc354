use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};
use payrail_primitives::error::ApiError;
use tracing::info;

pub const PAYOUT_QUEUE: &str = "payout_queue";
pub const DLX_EXCHANGE: &str = "dlx_payout";
pub const DLQ_QUEUE: &str = "payout_dlq";
pub const DLQ_ROUTING_KEY: &str = "payout";

/// Poison messages sit in the main queue at most one day before dead-letter
/// routing reaps them.
pub const MESSAGE_TTL_MS: i64 = 86_400_000;

/// Declares the settlement topology. All declarations are idempotent, so
/// every gateway and worker runs this on boot.
pub async fn declare(channel: &Channel) -> Result<(), ApiError> {
    let durable = QueueDeclareOptions {
        durable: true,
        ..QueueDeclareOptions::default()
    };

    channel
        .exchange_declare(
            DLX_EXCHANGE,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;

    channel
        .queue_declare(DLQ_QUEUE, durable, FieldTable::default())
        .await?;

    channel
        .queue_bind(
            DLQ_QUEUE,
            DLX_EXCHANGE,
            DLQ_ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut args = FieldTable::default();
    args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(DLX_EXCHANGE.into()),
    );
    args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(DLQ_ROUTING_KEY.into()),
    );
    args.insert("x-message-ttl".into(), AMQPValue::LongLongInt(MESSAGE_TTL_MS));

    channel.queue_declare(PAYOUT_QUEUE, durable, args).await?;

    info!(
        queue = PAYOUT_QUEUE,
        dlx = DLX_EXCHANGE,
        dlq = DLQ_QUEUE,
        "Broker topology declared"
    );

    Ok(())
}
