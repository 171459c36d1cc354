use axum::extract::{ConnectInfo, State};
use axum::Json;
use http::{header, HeaderMap, StatusCode};
use payrail_core::cache::rate_limiter::RateLimiter;
use payrail_core::services::payout_service::PayoutService;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::app_state::AppState;
use payrail_primitives::models::dtos::payout_dto::{PayoutRequest, PayoutResponse, RequestMeta};
use std::net::SocketAddr;
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/api/payout",
    request_body = PayoutRequest,
    responses(
        (status = 202, description = "Payout accepted and queued", body = PayoutResponse),
        (status = 400, description = "Validation failure or insufficient balance"),
        (status = 403, description = "User is not active"),
        (status = 404, description = "Unknown user"),
        (status = 409, description = "A payout for this user is already in flight"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 503, description = "Queue or cache unavailable")
    ),
    tag = "Payout"
)]
pub async fn initiate_payout(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<PayoutRequest>,
) -> Result<(StatusCode, Json<PayoutResponse>), ApiError> {
    // per-user limiter keys on the body's user id, falling back to the
    // caller's address when the body carries none
    let limiter_key = if req.user_id.is_empty() {
        addr.ip().to_string()
    } else {
        req.user_id.clone()
    };

    let decision = RateLimiter::check(
        &state.redis,
        &RateLimiter::user_key(&limiter_key),
        state.config.user_rate_limit_window_ms,
        state.config.user_rate_limit_max_requests,
    )
    .await?;

    if !decision.allowed {
        return Err(ApiError::UserRateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    let meta = RequestMeta {
        ip_address: Some(addr.ip().to_string()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()),
        source: Some("api".to_string()),
    };

    let response = PayoutService::initiate_payout(state.as_ref(), req, meta).await?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}
