use crate::error::ApiError;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display, EnumString, ToSchema,
)]
#[ExistingTypePath = "crate::schema::sql_types::CurrencyCode"]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    USD,
    EUR,
    GBP,
    INR,
}

impl CurrencyCode {
    pub fn parse(input: &str) -> Result<Self, ApiError> {
        let normalized = input.trim().to_uppercase();

        CurrencyCode::from_str(&normalized)
            .map_err(|_| ApiError::Validation(format!("unsupported currency: {}", input)))
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display, EnumString, ToSchema,
)]
#[ExistingTypePath = "crate::schema::sql_types::AccountStatus"]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
    Closed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display, EnumString, ToSchema,
)]
#[ExistingTypePath = "crate::schema::sql_types::TransactionStatus"]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Initiated,
    Processing,
    Completed,
    Failed,
    RolledBack,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::RolledBack
        )
    }

    /// Forward-only state machine: initiated → processing → completed, with
    /// failed reachable from the two non-terminal states. `rolled_back` is
    /// operator-only and never produced here.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, next),
            (Initiated, Processing) | (Processing, Completed) | (Initiated, Failed) | (Processing, Failed)
        )
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum, Display, EnumString, ToSchema,
)]
#[ExistingTypePath = "crate::schema::sql_types::TransactionType"]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Payout,
    Refund,
    Adjustment,
}

/// Audit trail action names, stored as text in `audit_logs.action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    PayoutInitiated,
    PayoutProcessing,
    PayoutCompleted,
    PayoutFailed,
    LockAcquired,
    LockReleased,
    BalanceDeducted,
    BalanceRestored,
    MessagePublished,
    MessageConsumed,
    MessageAcked,
    MessageNacked,
}

/// Status event names pushed to connected clients, exactly as they appear
/// on the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutEvent {
    PayoutInitiated,
    PayoutProcessing,
    PayoutCompleted,
    PayoutFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_parse_normalizes_case() {
        assert_eq!(CurrencyCode::parse("usd").unwrap(), CurrencyCode::USD);
        assert_eq!(CurrencyCode::parse(" eur ").unwrap(), CurrencyCode::EUR);
        assert!(CurrencyCode::parse("NGN").is_err());
    }

    #[test]
    fn status_transitions_are_forward_only() {
        use TransactionStatus::*;

        assert!(Initiated.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Initiated.can_transition_to(Failed));
        assert!(Processing.can_transition_to(Failed));

        // no resurrection from terminal states
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Initiated));
    }

    #[test]
    fn audit_actions_render_screaming_snake() {
        assert_eq!(AuditAction::PayoutInitiated.to_string(), "PAYOUT_INITIATED");
        assert_eq!(AuditAction::BalanceDeducted.to_string(), "BALANCE_DEDUCTED");
        assert_eq!(AuditAction::MessageNacked.to_string(), "MESSAGE_NACKED");
    }

    #[test]
    fn payout_events_serialize_to_wire_names() {
        let json = serde_json::to_string(&PayoutEvent::PayoutCompleted).unwrap();
        assert_eq!(json, "\"PAYOUT_COMPLETED\"");
    }
}
