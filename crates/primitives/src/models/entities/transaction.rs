use crate::models::entities::enum_types::{CurrencyCode, TransactionStatus, TransactionType};
use chrono::{DateTime, Utc};
use diesel::{Associations, Identifiable, Insertable, Queryable};
use serde::Serialize;

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = crate::schema::transactions)]
#[diesel(primary_key(transaction_id))]
#[diesel(belongs_to(crate::models::entities::user::User))]
pub struct Transaction {
    pub transaction_id: String,
    pub user_id: String,

    pub amount: i64,
    pub currency: CurrencyCode,

    pub status: TransactionStatus,
    pub tx_type: TransactionType,

    pub balance_before: i64,
    pub balance_after: i64,

    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub source: Option<String>,
    pub description: Option<String>,

    pub error_code: Option<String>,
    pub error_message: Option<String>,

    pub lock_acquired: bool,
    pub lock_token: Option<String>,

    pub initiated_at: DateTime<Utc>,
    pub processing_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub processing_duration_ms: Option<i64>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::transactions)]
pub struct NewTransaction<'a> {
    pub transaction_id: &'a str,
    pub user_id: &'a str,
    pub amount: i64,
    pub currency: CurrencyCode,
    pub status: TransactionStatus,
    pub tx_type: TransactionType,
    pub balance_before: i64,
    pub balance_after: i64,
    pub ip_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub source: Option<&'a str>,
    pub description: Option<&'a str>,
    pub lock_acquired: bool,
    pub lock_token: Option<&'a str>,
    pub initiated_at: DateTime<Utc>,
}
