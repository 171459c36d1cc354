use axum::extract::{Path, State};
use axum::Json;
use payrail_core::repositories::transaction_repository::TransactionRepository;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::app_state::AppState;
use payrail_primitives::models::dtos::transaction_dto::{TransactionDto, TransactionResponse};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/payout/{transaction_id}",
    responses(
        (status = 200, description = "Transaction found", body = TransactionResponse),
        (status = 404, description = "Unknown transaction")
    ),
    params(("transaction_id" = String, Path)),
    tag = "Payout"
)]
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let mut conn = state.db.get()?;

    let tx = TransactionRepository::find_by_id(&mut conn, &transaction_id)?
        .ok_or(ApiError::TransactionNotFound(transaction_id))?;

    Ok(Json(TransactionResponse {
        success: true,
        transaction: TransactionDto::from(tx),
    }))
}
