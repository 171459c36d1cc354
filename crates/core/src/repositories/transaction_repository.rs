use chrono::{DateTime, Utc};
use diesel::prelude::*;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::entities::enum_types::TransactionStatus;
use payrail_primitives::models::entities::transaction::{NewTransaction, Transaction};
use payrail_primitives::schema::transactions;

/// Typed layer over the durable transaction record. State transitions are
/// status-guarded updates, so repeating a transition that already happened
/// is a no-op rather than an error or a resurrection.
pub struct TransactionRepository;

impl TransactionRepository {
    pub fn create(
        conn: &mut PgConnection,
        new_tx: NewTransaction,
    ) -> Result<Transaction, ApiError> {
        diesel::insert_into(transactions::table)
            .values(&new_tx)
            .get_result::<Transaction>(conn)
            .map_err(ApiError::Database)
    }

    pub fn find_by_id(
        conn: &mut PgConnection,
        transaction_id: &str,
    ) -> Result<Option<Transaction>, ApiError> {
        transactions::table
            .find(transaction_id)
            .first::<Transaction>(conn)
            .optional()
            .map_err(ApiError::Database)
    }

    pub fn find_by_user(
        conn: &mut PgConnection,
        user_id: &str,
        status: Option<TransactionStatus>,
        limit: i64,
    ) -> Result<Vec<Transaction>, ApiError> {
        let mut query = transactions::table
            .filter(transactions::user_id.eq(user_id))
            .into_boxed();

        if let Some(status) = status {
            query = query.filter(transactions::status.eq(status));
        }

        query
            .order(transactions::created_at.desc())
            .limit(limit)
            .load::<Transaction>(conn)
            .map_err(ApiError::Database)
    }

    /// initiated → processing. Returns whether this call performed the
    /// transition.
    pub fn mark_processing(
        conn: &mut PgConnection,
        transaction_id: &str,
    ) -> Result<bool, ApiError> {
        let now = Utc::now();

        let updated = diesel::update(
            transactions::table
                .find(transaction_id)
                .filter(transactions::status.eq(TransactionStatus::Initiated)),
        )
        .set((
            transactions::status.eq(TransactionStatus::Processing),
            transactions::processing_at.eq(now),
            transactions::updated_at.eq(now),
        ))
        .execute(conn)
        .map_err(ApiError::Database)?;

        Ok(updated > 0)
    }

    /// processing → completed, recording the settled balance and the
    /// settlement latency.
    pub fn mark_completed(
        conn: &mut PgConnection,
        transaction_id: &str,
        balance_after: i64,
        duration_ms: i64,
    ) -> Result<bool, ApiError> {
        let now = Utc::now();

        let updated = diesel::update(
            transactions::table
                .find(transaction_id)
                .filter(transactions::status.eq(TransactionStatus::Processing)),
        )
        .set((
            transactions::status.eq(TransactionStatus::Completed),
            transactions::balance_after.eq(balance_after),
            transactions::completed_at.eq(now),
            transactions::processing_duration_ms.eq(Some(duration_ms)),
            transactions::updated_at.eq(now),
        ))
        .execute(conn)
        .map_err(ApiError::Database)?;

        Ok(updated > 0)
    }

    /// initiated|processing → failed. Terminal rows are left untouched.
    pub fn mark_failed(
        conn: &mut PgConnection,
        transaction_id: &str,
        error_code: &str,
        error_message: &str,
    ) -> Result<bool, ApiError> {
        let now = Utc::now();

        let updated = diesel::update(
            transactions::table
                .find(transaction_id)
                .filter(transactions::status.eq_any([
                    TransactionStatus::Initiated,
                    TransactionStatus::Processing,
                ])),
        )
        .set((
            transactions::status.eq(TransactionStatus::Failed),
            transactions::error_code.eq(error_code),
            transactions::error_message.eq(error_message),
            transactions::failed_at.eq(now),
            transactions::updated_at.eq(now),
        ))
        .execute(conn)
        .map_err(ApiError::Database)?;

        Ok(updated > 0)
    }

    /// Operator-level reaper: transactions pinned in `processing` longer
    /// than the cutoff are failed in bulk. Returns the reaped rows.
    pub fn expire_stale_processing(
        conn: &mut PgConnection,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, ApiError> {
        let now = Utc::now();

        diesel::update(
            transactions::table
                .filter(transactions::status.eq(TransactionStatus::Processing))
                .filter(transactions::processing_at.lt(cutoff)),
        )
        .set((
            transactions::status.eq(TransactionStatus::Failed),
            transactions::error_code.eq("STALE_PROCESSING"),
            transactions::error_message
                .eq("settlement did not conclude within the allowed age"),
            transactions::failed_at.eq(now),
            transactions::updated_at.eq(now),
        ))
        .get_results::<Transaction>(conn)
        .map_err(ApiError::Database)
    }
}
