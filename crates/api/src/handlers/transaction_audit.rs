use axum::extract::{Path, State};
use axum::Json;
use payrail_core::repositories::audit_repository::AuditLogRepository;
use payrail_core::repositories::transaction_repository::TransactionRepository;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::app_state::AppState;
use serde_json::{json, Value};
use std::sync::Arc;

/// Operator view of a transaction's audit trail, oldest entry first.
#[utoipa::path(
    get,
    path = "/api/payout/{transaction_id}/audit",
    responses(
        (status = 200, description = "Audit trail for the transaction"),
        (status = 404, description = "Unknown transaction")
    ),
    params(("transaction_id" = String, Path)),
    tag = "Payout"
)]
pub async fn transaction_audit(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut conn = state.db.get()?;

    TransactionRepository::find_by_id(&mut conn, &transaction_id)?
        .ok_or_else(|| ApiError::TransactionNotFound(transaction_id.clone()))?;

    let entries = AuditLogRepository::find_by_transaction(&mut conn, &transaction_id)?;

    Ok(Json(json!({
        "success": true,
        "count": entries.len(),
        "entries": entries,
    })))
}
