use crate::config::swagger_config::ApiDoc;
use crate::handlers::{
    get_transaction::get_transaction, health::health_check, health::health_detailed,
    health::liveness, health::readiness, initiate_payout::initiate_payout,
    transaction_audit::transaction_audit, user_balance::user_balance, user_history::user_history,
};
use crate::ws::{websocket_handler, SessionRegistry};
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Router};
use payrail_core::cache::rate_limiter::RateLimiter;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::app_state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn create_router(state: Arc<AppState>, sessions: Arc<SessionRegistry>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    let mut router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/payout", post(initiate_payout))
        .route("/api/payout/{transaction_id}", get(get_transaction))
        .route("/api/payout/{transaction_id}/audit", get(transaction_audit))
        .route("/api/payout/user/{user_id}/balance", get(user_balance))
        .route("/api/payout/user/{user_id}/history", get(user_history))
        .route("/api/health", get(health_check))
        .route("/api/health/detailed", get(health_detailed))
        .route("/api/health/ready", get(readiness))
        .route("/api/health/live", get(liveness))
        .route("/ws", get(websocket_handler))
        .layer(Extension(sessions))
        .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http()),
        )
        .layer(cors);

    // disabled under test so shared-IP TestServer traffic does not trip it
    if std::env::var("APP_ENV").unwrap_or_default() != "test" {
        router = router.layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));
    }

    router.with_state(state)
}

/// Global per-IP limiter. Health and metrics probes bypass it, and the
/// per-user limiter at the intake handler is unaffected.
async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if req.uri().path().starts_with("/api/health") {
        return Ok(next.run(req).await);
    }

    let decision = RateLimiter::check(
        &state.redis,
        &RateLimiter::ip_key(&addr.ip().to_string()),
        state.config.rate_limit_window_ms,
        state.config.rate_limit_max_requests,
    )
    .await?;

    if !decision.allowed {
        return Err(ApiError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    Ok(next.run(req).await)
}
