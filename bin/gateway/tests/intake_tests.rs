mod common;

use common::fixtures::{create_test_user, unique_user_id};
use diesel::prelude::*;
use http::StatusCode;
use payrail_primitives::models::entities::enum_types::AccountStatus;
use payrail_primitives::schema::transactions;
use serde_json::{json, Value};
use serial_test::serial;

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn payout_is_admitted_and_queued() {
    let ctx = common::create_test_context().await;
    let server = common::create_test_app(ctx.state.clone());

    let user_id = unique_user_id("user");
    let conn = &mut ctx.state.db.get().unwrap();
    create_test_user(conn, &user_id, 1_000_000, AccountStatus::Active);

    let response = server
        .post("/api/payout")
        .json(&json!({ "user_id": user_id, "amount": 100.50, "currency": "USD" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::ACCEPTED);

    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["status"], json!("initiated"));
    assert_eq!(body["amount"], json!(100.50));
    let transaction_id = body["transaction_id"].as_str().unwrap();
    assert!(transaction_id.starts_with("TXN_"));

    // durable record in `initiated`, admission snapshot recorded
    let (balance_before, balance_after): (i64, i64) = transactions::table
        .find(transaction_id)
        .select((transactions::balance_before, transactions::balance_after))
        .first(conn)
        .unwrap();
    assert_eq!(balance_before, 1_000_000);
    assert_eq!(balance_after, 989_950);

    // admission seeded the pending balance but did not deduct it
    let mut redis = ctx.state.redis.clone();
    let cached: Option<i64> = redis::cmd("GET")
        .arg(format!("balance:{}", user_id))
        .query_async(&mut redis)
        .await
        .unwrap();
    assert_eq!(cached, Some(1_000_000));
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn concurrent_duplicate_is_rejected() {
    let ctx = common::create_test_context().await;
    let server = common::create_test_app(ctx.state.clone());

    let user_id = unique_user_id("user");
    let conn = &mut ctx.state.db.get().unwrap();
    create_test_user(conn, &user_id, 500_000, AccountStatus::Active);

    let first = server
        .post("/api/payout")
        .json(&json!({ "user_id": user_id, "amount": 100.00 }))
        .await;
    assert_eq!(first.status_code(), StatusCode::ACCEPTED);

    // no worker runs here, so the lock is still handed off and held
    let second = server
        .post("/api/payout")
        .json(&json!({ "user_id": user_id, "amount": 100.00 }))
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);

    let body: Value = second.json();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("CONCURRENT_REQUEST"));
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn insufficient_balance_rejects_and_releases_the_lock() {
    let ctx = common::create_test_context().await;
    let server = common::create_test_app(ctx.state.clone());

    let user_id = unique_user_id("user");
    let conn = &mut ctx.state.db.get().unwrap();
    create_test_user(conn, &user_id, 500_000, AccountStatus::Active);

    let response = server
        .post("/api/payout")
        .json(&json!({ "user_id": user_id, "amount": 5_000.01 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let body: Value = response.json();
    assert_eq!(body["code"], json!("INSUFFICIENT_BALANCE"));

    // nothing persisted
    let count: i64 = transactions::table
        .filter(transactions::user_id.eq(&user_id))
        .count()
        .get_result(conn)
        .unwrap();
    assert_eq!(count, 0);

    // the lock was released on the failure path: an affordable payout is
    // admitted immediately
    let retry = server
        .post("/api/payout")
        .json(&json!({ "user_id": user_id, "amount": 100.00 }))
        .await;
    assert_eq!(retry.status_code(), StatusCode::ACCEPTED);
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn unknown_and_inactive_users_are_rejected() {
    let ctx = common::create_test_context().await;
    let server = common::create_test_app(ctx.state.clone());

    let response = server
        .post("/api/payout")
        .json(&json!({ "user_id": unique_user_id("ghost"), "amount": 10.00 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], json!("USER_NOT_FOUND"));

    let suspended = unique_user_id("suspended");
    let conn = &mut ctx.state.db.get().unwrap();
    create_test_user(conn, &suspended, 100_000, AccountStatus::Suspended);

    let response = server
        .post("/api/payout")
        .json(&json!({ "user_id": suspended, "amount": 10.00 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], json!("USER_NOT_ACTIVE"));
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn amount_boundaries_are_enforced() {
    let ctx = common::create_test_context().await;
    let server = common::create_test_app(ctx.state.clone());

    let user_id = unique_user_id("user");
    let conn = &mut ctx.state.db.get().unwrap();
    create_test_user(conn, &user_id, 10_000_000, AccountStatus::Active);

    for bad_amount in [0.0, -5.0, 1.001, 10_000.01] {
        let response = server
            .post("/api/payout")
            .json(&json!({ "user_id": user_id, "amount": bad_amount }))
            .await;
        assert_eq!(
            response.status_code(),
            StatusCode::BAD_REQUEST,
            "amount {} must be rejected",
            bad_amount
        );
        let body: Value = response.json();
        assert_eq!(body["code"], json!("VALIDATION_ERROR"));
    }

    let response = server
        .post("/api/payout")
        .json(&json!({ "user_id": user_id, "amount": 10.00, "currency": "XYZ" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // the minimum payable amount is admitted
    let response = server
        .post("/api/payout")
        .json(&json!({ "user_id": user_id, "amount": 0.01 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn eleventh_rapid_request_trips_the_user_limiter() {
    let ctx = common::create_test_context().await;
    let server = common::create_test_app(ctx.state.clone());

    let user_id = unique_user_id("user");
    let conn = &mut ctx.state.db.get().unwrap();
    create_test_user(conn, &user_id, 10_000_000, AccountStatus::Active);

    let mut last_status = StatusCode::OK;
    let mut last_body = Value::Null;
    for _ in 0..11 {
        let response = server
            .post("/api/payout")
            .json(&json!({ "user_id": user_id, "amount": 1.00 }))
            .await;
        last_status = response.status_code();
        last_body = response.json();
    }

    assert_eq!(last_status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(last_body["code"], json!("USER_RATE_LIMIT_EXCEEDED"));
    assert!(last_body["retry_after"].as_u64().unwrap() <= 60);
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn balance_and_history_read_paths() {
    let ctx = common::create_test_context().await;
    let server = common::create_test_app(ctx.state.clone());

    let user_id = unique_user_id("user");
    let conn = &mut ctx.state.db.get().unwrap();
    create_test_user(conn, &user_id, 123_456, AccountStatus::Active);

    // cold cache falls back to the durable balance
    let response = server
        .get(&format!("/api/payout/user/{}/balance", user_id))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["balance"], json!(1_234.56));
    assert_eq!(body["currency"], json!("USD"));

    let response = server
        .get(&format!("/api/payout/user/{}/history", user_id))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["count"], json!(0));

    let response = server.get("/api/payout/user/nobody_here/balance").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let response = server
        .get(&format!("/api/payout/user/{}/history?status=bogus", user_id))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}
