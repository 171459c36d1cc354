use crate::models::entities::enum_types::{CurrencyCode, TransactionStatus, TransactionType};
use crate::models::entities::transaction::Transaction;
use crate::utility::to_major_units;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Client-facing view of a transaction. Amounts are rendered as 2dp
/// decimals; internal bookkeeping columns stay internal.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionDto {
    pub transaction_id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: CurrencyCode,
    pub status: TransactionStatus,
    pub tx_type: TransactionType,
    pub balance_before: f64,
    pub balance_after: f64,
    pub description: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub processing_duration_ms: Option<i64>,
}

impl From<Transaction> for TransactionDto {
    fn from(tx: Transaction) -> Self {
        Self {
            transaction_id: tx.transaction_id,
            user_id: tx.user_id,
            amount: to_major_units(tx.amount),
            currency: tx.currency,
            status: tx.status,
            tx_type: tx.tx_type,
            balance_before: to_major_units(tx.balance_before),
            balance_after: to_major_units(tx.balance_after),
            description: tx.description,
            error_code: tx.error_code,
            error_message: tx.error_message,
            initiated_at: tx.initiated_at,
            completed_at: tx.completed_at,
            failed_at: tx.failed_at,
            processing_duration_ms: tx.processing_duration_ms,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub success: bool,
    pub transaction: TransactionDto,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    pub success: bool,
    pub user_id: String,
    pub balance: f64,
    pub currency: CurrencyCode,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub success: bool,
    pub count: usize,
    pub transactions: Vec<TransactionDto>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    pub status: Option<String>,
}
