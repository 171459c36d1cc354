//! Operator-level recovery for settlements that died mid-flight: a worker
//! crash after `mark_processing` leaves the row pinned in `processing`
//! forever, because redelivery exits early on that status. This task fails
//! such rows after a configurable age so the account becomes payable again.
//! The cache is deliberately not touched: whether the deduct happened is
//! not decidable from the row, so money reconciliation stays with the
//! operator and the audit trail.

use chrono::Utc;
use payrail_core::repositories::transaction_repository::TransactionRepository;
use payrail_core::services::audit_service::AuditService;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::app_state::AppState;
use payrail_primitives::models::entities::enum_types::AuditAction;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub fn spawn_reaper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(state.config.reaper_interval_ms));
        // the first tick fires immediately; skip it so a restart loop does
        // not hammer the store
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = reap_stale_processing(&state).await {
                warn!(error = %e, "stale-processing reaper pass failed");
            }
        }
    });
}

async fn reap_stale_processing(state: &AppState) -> Result<(), ApiError> {
    let cutoff =
        Utc::now() - chrono::Duration::milliseconds(state.config.stale_processing_max_age_ms as i64);

    let mut conn = state.db.get()?;
    let reaped = TransactionRepository::expire_stale_processing(&mut conn, cutoff)?;

    for tx in &reaped {
        warn!(
            transaction_id = %tx.transaction_id,
            user_id = %tx.user_id,
            processing_at = ?tx.processing_at,
            "Reaped transaction stuck in processing"
        );

        AuditService::record(
            state,
            Some(&tx.transaction_id),
            Some(&tx.user_id),
            AuditAction::PayoutFailed,
            json!({
                "error": "STALE_PROCESSING",
                "max_age_ms": state.config.stale_processing_max_age_ms,
            }),
        )
        .await;
    }

    if !reaped.is_empty() {
        info!(count = reaped.len(), "Stale-processing reaper pass complete");
    }

    Ok(())
}
