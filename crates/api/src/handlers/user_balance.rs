use axum::extract::{Path, State};
use axum::Json;
use payrail_core::cache::balance::BalanceCache;
use payrail_core::repositories::user_repository::UserRepository;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::app_state::AppState;
use payrail_primitives::models::dtos::transaction_dto::BalanceResponse;
use payrail_primitives::utility::to_major_units;
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/payout/user/{user_id}/balance",
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 404, description = "Unknown user")
    ),
    params(("user_id" = String, Path)),
    tag = "Payout"
)]
pub async fn user_balance(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let mut conn = state.db.get()?;

    let user = UserRepository::find_by_id(&mut conn, &user_id)?
        .ok_or_else(|| ApiError::UserNotFound(user_id.clone()))?;

    // the cached pending balance is authoritative when present; a cold
    // cache falls back to the durable balance without seeding it
    let balance = BalanceCache::get(&state.redis, &user_id)
        .await?
        .unwrap_or(user.balance);

    Ok(Json(BalanceResponse {
        success: true,
        user_id,
        balance: to_major_units(balance),
        currency: user.currency,
    }))
}
