use crate::models::dtos::payout_dto::RequestMeta;
use crate::models::entities::enum_types::{CurrencyCode, PayoutEvent};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Body of a settlement work item on the broker. The broker-level message
/// id duplicates `transaction_id` so consumers can de-duplicate without
/// parsing the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementEnvelope {
    pub transaction_id: String,
    pub user_id: String,
    /// Minor units.
    pub amount: i64,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub metadata: RequestMeta,
    /// Millisecond epoch at publish time.
    pub timestamp: i64,
}

impl SettlementEnvelope {
    pub fn new(
        transaction_id: &str,
        user_id: &str,
        amount: i64,
        currency: CurrencyCode,
        metadata: RequestMeta,
    ) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            user_id: user_id.to_string(),
            amount,
            currency,
            metadata,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// One status event on the cache pub/sub channel. Every gateway instance
/// receives every envelope and relays it to local sessions of `user_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub user_id: String,
    pub event: PayoutEvent,
    pub data: serde_json::Value,
    /// Millisecond epoch at emit time.
    pub timestamp: i64,
}

impl EventEnvelope {
    pub fn new(user_id: &str, event: PayoutEvent, data: serde_json::Value) -> Self {
        Self {
            user_id: user_id.to_string(),
            event,
            data,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settlement_envelope_round_trips() {
        let envelope = SettlementEnvelope::new(
            "TXN_ABC_123",
            "user_001",
            10_050,
            CurrencyCode::USD,
            RequestMeta {
                ip_address: Some("10.0.0.1".to_string()),
                user_agent: None,
                source: Some("api".to_string()),
            },
        );

        let bytes = serde_json::to_vec(&envelope).unwrap();
        let parsed: SettlementEnvelope = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(parsed.transaction_id, "TXN_ABC_123");
        assert_eq!(parsed.user_id, "user_001");
        assert_eq!(parsed.amount, 10_050);
        assert_eq!(parsed.currency, CurrencyCode::USD);
        assert_eq!(parsed.metadata.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(parsed.timestamp, envelope.timestamp);
    }

    #[test]
    fn envelope_tolerates_missing_metadata() {
        let raw = json!({
            "transaction_id": "TXN_X_Y",
            "user_id": "user_002",
            "amount": 100,
            "currency": "EUR",
            "timestamp": 1
        });

        let parsed: SettlementEnvelope = serde_json::from_value(raw).unwrap();
        assert!(parsed.metadata.ip_address.is_none());
    }

    #[test]
    fn event_envelope_carries_wire_event_names() {
        let envelope = EventEnvelope::new(
            "user_001",
            PayoutEvent::PayoutCompleted,
            json!({"status": "completed"}),
        );

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["event"], "PAYOUT_COMPLETED");
        assert_eq!(value["user_id"], "user_001");
    }
}
