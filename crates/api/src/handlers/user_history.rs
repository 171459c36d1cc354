use axum::extract::{Path, Query, State};
use axum::Json;
use payrail_core::repositories::transaction_repository::TransactionRepository;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::app_state::AppState;
use payrail_primitives::models::dtos::transaction_dto::{
    HistoryParams, HistoryResponse, TransactionDto,
};
use payrail_primitives::models::entities::enum_types::TransactionStatus;
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[utoipa::path(
    get,
    path = "/api/payout/user/{user_id}/history",
    responses(
        (status = 200, description = "Transactions, newest first", body = HistoryResponse),
        (status = 400, description = "Bad status filter")
    ),
    params(
        ("user_id" = String, Path),
        ("limit" = Option<i64>, Query),
        ("status" = Option<String>, Query)
    ),
    tag = "Payout"
)]
pub async fn user_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let status = params
        .status
        .as_deref()
        .map(|raw| {
            TransactionStatus::from_str(raw)
                .map_err(|_| ApiError::Validation(format!("unknown status filter: {}", raw)))
        })
        .transpose()?;

    let mut conn = state.db.get()?;
    let transactions = TransactionRepository::find_by_user(&mut conn, &user_id, status, limit)?;

    Ok(Json(HistoryResponse {
        success: true,
        count: transactions.len(),
        transactions: transactions.into_iter().map(TransactionDto::from).collect(),
    }))
}
