use crate::cache::balance::BalanceCache;
use crate::cache::events::EventBridge;
use crate::cache::lock::LockService;
use crate::mq::publisher::Publisher;
use crate::repositories::transaction_repository::TransactionRepository;
use crate::repositories::user_repository::UserRepository;
use crate::services::audit_service::AuditService;
use chrono::Utc;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::app_state::AppState;
use payrail_primitives::models::dtos::envelope::SettlementEnvelope;
use payrail_primitives::models::dtos::payout_dto::{PayoutRequest, PayoutResponse, RequestMeta};
use payrail_primitives::models::entities::enum_types::{
    AccountStatus, AuditAction, CurrencyCode, PayoutEvent, TransactionStatus, TransactionType,
};
use payrail_primitives::models::entities::transaction::NewTransaction;
use payrail_primitives::utility::{generate_transaction_id, to_major_units, to_minor_units};
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

pub struct PayoutService;

impl PayoutService {
    /// Gateway intake. Admission runs entirely under the per-user lock; on
    /// success the lock is deliberately NOT released here. It travels with
    /// the queued work item and the worker releases it after settlement, so
    /// a concurrent second request cannot pass the advisory balance check
    /// against a cache the first one is about to deduct.
    pub async fn initiate_payout(
        state: &AppState,
        req: PayoutRequest,
        meta: RequestMeta,
    ) -> Result<PayoutResponse, ApiError> {
        req.validate()?;

        let currency = match req.currency.as_deref() {
            Some(raw) => CurrencyCode::parse(raw)?,
            None => CurrencyCode::USD,
        };

        if req.amount < state.config.min_payout_amount {
            return Err(ApiError::Validation(format!(
                "amount must be at least {:.2}",
                state.config.min_payout_amount
            )));
        }
        if req.amount > state.config.max_payout_amount {
            return Err(ApiError::Validation(format!(
                "amount exceeds the maximum of {:.2}",
                state.config.max_payout_amount
            )));
        }
        let amount = to_minor_units(req.amount)?;

        let transaction_id = generate_transaction_id();

        let token = LockService::acquire_with_retry(
            &state.redis,
            &req.user_id,
            state.config.lock_ttl_ms,
            state.config.lock_retry_count,
            state.config.lock_retry_delay_ms,
        )
        .await?
        .ok_or_else(|| ApiError::ConcurrentRequest(req.user_id.clone()))?;

        AuditService::record(
            state,
            Some(&transaction_id),
            Some(&req.user_id),
            AuditAction::LockAcquired,
            json!({ "ttl_ms": state.config.lock_ttl_ms }),
        )
        .await;

        match Self::admit(state, &req, &meta, &transaction_id, amount, currency, &token).await {
            Ok(response) => Ok(response),
            Err(err) => {
                Self::release_lock(state, &req.user_id, &transaction_id, &token).await;
                Err(err)
            }
        }
    }

    /// Steps 4–9 of intake, run while holding the lock. Any error here makes
    /// the caller release the lock before surfacing it.
    async fn admit(
        state: &AppState,
        req: &PayoutRequest,
        meta: &RequestMeta,
        transaction_id: &str,
        amount: i64,
        currency: CurrencyCode,
        token: &str,
    ) -> Result<PayoutResponse, ApiError> {
        let mut conn = state.db.get()?;

        let user = UserRepository::find_by_id(&mut conn, &req.user_id)?
            .ok_or_else(|| ApiError::UserNotFound(req.user_id.clone()))?;
        if user.status != AccountStatus::Active {
            return Err(ApiError::UserNotActive(req.user_id.clone()));
        }

        // cold cache rehydrates from the durable balance
        let balance_before = match BalanceCache::get(&state.redis, &req.user_id).await? {
            Some(cached) => cached,
            None => {
                BalanceCache::set(&state.redis, &req.user_id, user.balance).await?;
                user.balance
            }
        };

        // advisory only: the worker's scripted deduct is the real gate
        if !BalanceCache::has_sufficient(&state.redis, &req.user_id, amount).await? {
            return Err(ApiError::InsufficientBalance);
        }

        let tx = TransactionRepository::create(
            &mut conn,
            NewTransaction {
                transaction_id,
                user_id: &req.user_id,
                amount,
                currency,
                status: TransactionStatus::Initiated,
                tx_type: TransactionType::Payout,
                balance_before,
                balance_after: balance_before - amount,
                ip_address: meta.ip_address.as_deref(),
                user_agent: meta.user_agent.as_deref(),
                source: meta.source.as_deref(),
                description: req.description.as_deref(),
                lock_acquired: true,
                lock_token: Some(token),
                initiated_at: Utc::now(),
            },
        )?;

        AuditService::record(
            state,
            Some(transaction_id),
            Some(&req.user_id),
            AuditAction::PayoutInitiated,
            json!({
                "amount": to_major_units(amount),
                "currency": currency,
                "balance_before": to_major_units(balance_before),
            }),
        )
        .await;

        let envelope =
            SettlementEnvelope::new(transaction_id, &req.user_id, amount, currency, meta.clone());

        if let Err(publish_err) = Publisher::publish(state, &envelope).await {
            if let Err(e) = TransactionRepository::mark_failed(
                &mut conn,
                transaction_id,
                publish_err.code(),
                &publish_err.to_string(),
            ) {
                warn!(transaction_id, error = %e, "could not fail transaction after publish error");
            }
            return Err(publish_err);
        }

        AuditService::record(
            state,
            Some(transaction_id),
            Some(&req.user_id),
            AuditAction::MessagePublished,
            json!({ "queue": crate::mq::topology::PAYOUT_QUEUE }),
        )
        .await;

        EventBridge::emit_quietly(
            &state.redis,
            &req.user_id,
            PayoutEvent::PayoutInitiated,
            json!({
                "status": "initiated",
                "transaction_id": transaction_id,
                "amount": to_major_units(amount),
                "currency": currency,
                "timestamp": Utc::now().timestamp_millis(),
            }),
        )
        .await;

        info!(
            transaction_id,
            user_id = %req.user_id,
            amount = to_major_units(amount),
            "Payout admitted"
        );

        Ok(PayoutResponse {
            success: true,
            transaction_id: tx.transaction_id,
            status: TransactionStatus::Initiated.to_string(),
            amount: to_major_units(amount),
            currency: currency.to_string(),
            message: "Payout initiated and queued for settlement".to_string(),
        })
    }

    async fn release_lock(state: &AppState, user_id: &str, transaction_id: &str, token: &str) {
        match LockService::release(&state.redis, user_id, token).await {
            Ok(released) => {
                if released {
                    AuditService::record(
                        state,
                        Some(transaction_id),
                        Some(user_id),
                        AuditAction::LockReleased,
                        json!({ "path": "intake" }),
                    )
                    .await;
                }
            }
            Err(e) => {
                // TTL will reap the lock; admission already failed
                warn!(user_id, error = %e, "lock release failed during intake rollback");
            }
        }
    }
}
