use crate::models::entities::enum_types::{AccountStatus, CurrencyCode};
use chrono::{DateTime, Utc};
use diesel::{Identifiable, Insertable, Queryable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = crate::schema::users)]
#[diesel(primary_key(user_id))]
pub struct User {
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// Durable balance in minor units; lags the cached pending balance and
    /// is reconciled on completed settlements.
    pub balance: i64,
    pub currency: CurrencyCode,
    pub status: AccountStatus,
    pub total_payouts: i64,
    pub total_payout_amount: i64,
    pub last_payout_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    pub user_id: &'a str,
    pub display_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub balance: i64,
    pub currency: CurrencyCode,
    pub status: AccountStatus,
}
