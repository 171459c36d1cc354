use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use http::StatusCode;
use payrail_primitives::models::app_state::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "System is healthy"),
        (status = 503, description = "System is unhealthy")
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> StatusCode {
    match check_database(&state) {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            error!("Health check DB failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/health/detailed",
    responses((status = 200, description = "Per-component health report")),
    tag = "Health"
)]
pub async fn health_detailed(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let postgres = component_report(check_database(&state));
    let redis = component_report(check_redis(&state).await);
    let rabbitmq = component_report(check_broker(&state));

    let healthy = [&postgres, &redis, &rabbitmq]
        .iter()
        .all(|c| c["healthy"] == json!(true));

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "success": healthy,
            "components": {
                "postgres": postgres,
                "redis": redis,
                "rabbitmq": rabbitmq,
            }
        })),
    )
}

#[utoipa::path(
    get,
    path = "/api/health/ready",
    responses(
        (status = 200, description = "Ready to accept traffic"),
        (status = 503, description = "A collaborator is unavailable")
    ),
    tag = "Health"
)]
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    let db_ok = check_database(&state).is_ok();
    let redis_ok = check_redis(&state).await.is_ok();
    let broker_ok = check_broker(&state).is_ok();

    if db_ok && redis_ok && broker_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[utoipa::path(
    get,
    path = "/api/health/live",
    responses((status = 200, description = "Process is alive")),
    tag = "Health"
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

fn check_database(state: &AppState) -> Result<u128, String> {
    let started = Instant::now();
    let mut conn = state.db.get().map_err(|e| e.to_string())?;
    diesel::sql_query("SELECT 1")
        .execute(&mut conn)
        .map_err(|e| e.to_string())?;
    Ok(started.elapsed().as_millis())
}

async fn check_redis(state: &AppState) -> Result<u128, String> {
    let started = Instant::now();
    let mut con = state.redis.clone();
    let reply: String = redis::cmd("PING")
        .query_async(&mut con)
        .await
        .map_err(|e| e.to_string())?;
    if reply != "PONG" {
        return Err(format!("unexpected PING reply: {}", reply));
    }
    Ok(started.elapsed().as_millis())
}

fn check_broker(state: &AppState) -> Result<u128, String> {
    if state.amqp.status().connected() {
        Ok(0)
    } else {
        Err("channel is not open".to_string())
    }
}

fn component_report(result: Result<u128, String>) -> Value {
    match result {
        Ok(latency_ms) => json!({ "healthy": true, "latency_ms": latency_ms }),
        Err(error) => json!({ "healthy": false, "error": error }),
    }
}
