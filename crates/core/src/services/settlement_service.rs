use crate::cache::balance::{BalanceCache, DeductOutcome};
use crate::cache::events::EventBridge;
use crate::cache::lock::LockService;
use crate::repositories::transaction_repository::TransactionRepository;
use crate::repositories::user_repository::UserRepository;
use crate::services::audit_service::AuditService;
use chrono::Utc;
use diesel::PgConnection;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::app_state::AppState;
use payrail_primitives::models::dtos::envelope::SettlementEnvelope;
use payrail_primitives::models::entities::enum_types::{
    AuditAction, PayoutEvent, TransactionStatus,
};
use payrail_primitives::models::entities::transaction::Transaction;
use payrail_primitives::utility::to_major_units;
use serde_json::json;
use tracing::{error, info, warn};

/// Terminal result of one settlement attempt. Every variant is acked by the
/// consumer; retriable failures travel as `Err` instead.
#[derive(Debug, Clone, Copy)]
pub enum SettlementOutcome {
    Completed { new_balance: i64 },
    /// Redelivery of a transaction that already reached a terminal state.
    AlreadySettled,
    /// Business rejection: marked failed, nothing was deducted.
    InsufficientFunds,
}

pub struct SettlementService;

impl SettlementService {
    /// Worker settlement. The happy-path order is strict: deduct, persist
    /// transaction, update user, release lock, emit. A `PAYOUT_COMPLETED`
    /// event therefore always carries an already-written balance. The
    /// compensating credit is scoped to the post-deduct region only.
    pub async fn process_payout(
        state: &AppState,
        envelope: &SettlementEnvelope,
    ) -> Result<SettlementOutcome, ApiError> {
        let mut conn = state.db.get()?;

        let tx = TransactionRepository::find_by_id(&mut conn, &envelope.transaction_id)?
            .ok_or_else(|| ApiError::TransactionNotFound(envelope.transaction_id.clone()))?;

        // duplicate deliveries settle at most once
        match tx.status {
            TransactionStatus::Completed
            | TransactionStatus::Failed
            | TransactionStatus::RolledBack => {
                info!(
                    transaction_id = %tx.transaction_id,
                    status = %tx.status,
                    "Duplicate delivery of a settled transaction"
                );
                return Ok(SettlementOutcome::AlreadySettled);
            }
            TransactionStatus::Processing => {
                return Err(ApiError::AlreadyProcessing(tx.transaction_id.clone()));
            }
            TransactionStatus::Initiated => {}
        }

        TransactionRepository::mark_processing(&mut conn, &tx.transaction_id)?;
        let processing_started = Utc::now();

        // re-arm the handed-off lock for the settlement phase; the intake
        // TTL has been ticking since admission
        if let Some(token) = tx.lock_token.as_deref() {
            match LockService::extend(&state.redis, &tx.user_id, token, state.config.lock_ttl_ms)
                .await
            {
                Ok(true) => {}
                Ok(false) => warn!(
                    transaction_id = %tx.transaction_id,
                    "lock expired before settlement started, continuing unfenced"
                ),
                Err(e) => warn!(
                    transaction_id = %tx.transaction_id,
                    error = %e,
                    "lock extension failed"
                ),
            }
        }

        AuditService::record(
            state,
            Some(&tx.transaction_id),
            Some(&tx.user_id),
            AuditAction::PayoutProcessing,
            json!({ "amount": to_major_units(tx.amount) }),
        )
        .await;

        EventBridge::emit_quietly(
            &state.redis,
            &tx.user_id,
            PayoutEvent::PayoutProcessing,
            json!({
                "status": "processing",
                "transaction_id": tx.transaction_id,
                "amount": to_major_units(tx.amount),
                "currency": tx.currency,
                "timestamp": Utc::now().timestamp_millis(),
            }),
        )
        .await;

        let mut deducted: Option<i64> = None;
        match Self::settle(state, &mut conn, &tx, processing_started, &mut deducted).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                Self::compensate(state, &mut conn, &tx, deducted.is_some(), &err).await;
                Err(err)
            }
        }
    }

    async fn settle(
        state: &AppState,
        conn: &mut PgConnection,
        tx: &Transaction,
        processing_started: chrono::DateTime<Utc>,
        deducted: &mut Option<i64>,
    ) -> Result<SettlementOutcome, ApiError> {
        // a cold cache here is an infrastructure fault, not a business
        // rejection: the gateway seeded it at admission
        let balance = BalanceCache::get(&state.redis, &tx.user_id)
            .await?
            .ok_or_else(|| ApiError::Cache(format!("no cached balance for {}", tx.user_id)))?;

        if balance < tx.amount {
            return Self::reject_insufficient(state, conn, tx).await;
        }

        let new_balance = match BalanceCache::deduct(&state.redis, &tx.user_id, tx.amount).await? {
            DeductOutcome::Deducted(new_balance) => new_balance,
            DeductOutcome::Insufficient => {
                return Self::reject_insufficient(state, conn, tx).await;
            }
            DeductOutcome::NotFound => {
                return Err(ApiError::Cache(format!(
                    "balance for {} evicted during settlement",
                    tx.user_id
                )));
            }
        };
        *deducted = Some(new_balance);

        AuditService::record(
            state,
            Some(&tx.transaction_id),
            Some(&tx.user_id),
            AuditAction::BalanceDeducted,
            json!({
                "amount": to_major_units(tx.amount),
                "new_balance": to_major_units(new_balance),
            }),
        )
        .await;

        let duration_ms = (Utc::now() - processing_started).num_milliseconds();
        TransactionRepository::mark_completed(conn, &tx.transaction_id, new_balance, duration_ms)?;
        UserRepository::apply_settlement(conn, &tx.user_id, new_balance, tx.amount)?;

        Self::release_lock(state, tx).await;

        EventBridge::emit_quietly(
            &state.redis,
            &tx.user_id,
            PayoutEvent::PayoutCompleted,
            json!({
                "status": "completed",
                "transaction_id": tx.transaction_id,
                "amount": to_major_units(tx.amount),
                "currency": tx.currency,
                "new_balance": to_major_units(new_balance),
                "timestamp": Utc::now().timestamp_millis(),
            }),
        )
        .await;

        AuditService::record(
            state,
            Some(&tx.transaction_id),
            Some(&tx.user_id),
            AuditAction::PayoutCompleted,
            json!({
                "new_balance": to_major_units(new_balance),
                "processing_duration_ms": duration_ms,
            }),
        )
        .await;

        info!(
            transaction_id = %tx.transaction_id,
            user_id = %tx.user_id,
            new_balance = to_major_units(new_balance),
            duration_ms,
            "Payout settled"
        );

        Ok(SettlementOutcome::Completed { new_balance })
    }

    /// Business rejection at settlement time: nothing was deducted, so the
    /// cache is left alone and the message is acked.
    async fn reject_insufficient(
        state: &AppState,
        conn: &mut PgConnection,
        tx: &Transaction,
    ) -> Result<SettlementOutcome, ApiError> {
        TransactionRepository::mark_failed(
            conn,
            &tx.transaction_id,
            "INSUFFICIENT_BALANCE",
            "cached balance below payout amount at settlement",
        )?;

        Self::release_lock(state, tx).await;

        EventBridge::emit_quietly(
            &state.redis,
            &tx.user_id,
            PayoutEvent::PayoutFailed,
            json!({
                "status": "failed",
                "transaction_id": tx.transaction_id,
                "amount": to_major_units(tx.amount),
                "currency": tx.currency,
                "error": "INSUFFICIENT_BALANCE",
                "timestamp": Utc::now().timestamp_millis(),
            }),
        )
        .await;

        AuditService::record(
            state,
            Some(&tx.transaction_id),
            Some(&tx.user_id),
            AuditAction::PayoutFailed,
            json!({ "error": "INSUFFICIENT_BALANCE" }),
        )
        .await;

        Ok(SettlementOutcome::InsufficientFunds)
    }

    /// Recovery for retriable failures. The compensating credit runs only
    /// when the deduct actually happened; the cache key may have been
    /// evicted in between, which is surfaced loudly for the operator.
    async fn compensate(
        state: &AppState,
        conn: &mut PgConnection,
        tx: &Transaction,
        deduct_happened: bool,
        err: &ApiError,
    ) {
        if deduct_happened {
            match BalanceCache::add(&state.redis, &tx.user_id, tx.amount).await {
                Ok(Some(restored)) => {
                    AuditService::record(
                        state,
                        Some(&tx.transaction_id),
                        Some(&tx.user_id),
                        AuditAction::BalanceRestored,
                        json!({
                            "amount": to_major_units(tx.amount),
                            "restored_balance": to_major_units(restored),
                        }),
                    )
                    .await;
                }
                Ok(None) => {
                    error!(
                        transaction_id = %tx.transaction_id,
                        user_id = %tx.user_id,
                        "balance key missing during rollback, operator reconciliation required"
                    );
                }
                Err(e) => {
                    error!(
                        transaction_id = %tx.transaction_id,
                        user_id = %tx.user_id,
                        error = %e,
                        "compensating credit failed, operator reconciliation required"
                    );
                }
            }
        }

        if let Err(e) = TransactionRepository::mark_failed(
            conn,
            &tx.transaction_id,
            err.code(),
            &err.to_string(),
        ) {
            warn!(
                transaction_id = %tx.transaction_id,
                error = %e,
                "could not mark transaction failed during recovery"
            );
        }

        Self::release_lock(state, tx).await;

        EventBridge::emit_quietly(
            &state.redis,
            &tx.user_id,
            PayoutEvent::PayoutFailed,
            json!({
                "status": "failed",
                "transaction_id": tx.transaction_id,
                "amount": to_major_units(tx.amount),
                "currency": tx.currency,
                "error": err.code(),
                "timestamp": Utc::now().timestamp_millis(),
            }),
        )
        .await;

        AuditService::record(
            state,
            Some(&tx.transaction_id),
            Some(&tx.user_id),
            AuditAction::PayoutFailed,
            json!({ "error": err.code(), "detail": err.to_string() }),
        )
        .await;
    }

    /// Token-scoped release of the lock handed over by the gateway. Never an
    /// unconditional delete: an expired lock re-acquired by a newer request
    /// must survive this holder's release.
    async fn release_lock(state: &AppState, tx: &Transaction) {
        let Some(token) = tx.lock_token.as_deref() else {
            warn!(
                transaction_id = %tx.transaction_id,
                "transaction carries no lock token, relying on TTL expiry"
            );
            return;
        };

        match LockService::release(&state.redis, &tx.user_id, token).await {
            Ok(true) => {
                AuditService::record(
                    state,
                    Some(&tx.transaction_id),
                    Some(&tx.user_id),
                    AuditAction::LockReleased,
                    json!({ "path": "settlement" }),
                )
                .await;
            }
            Ok(false) => {
                // TTL already reaped it, or a successor holds a newer token
                warn!(
                    transaction_id = %tx.transaction_id,
                    user_id = %tx.user_id,
                    "lock was no longer held under this token"
                );
            }
            Err(e) => {
                warn!(
                    transaction_id = %tx.transaction_id,
                    user_id = %tx.user_id,
                    error = %e,
                    "lock release failed, TTL will reap it"
                );
            }
        }
    }
}
