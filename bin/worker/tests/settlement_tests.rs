mod common;

use common::{create_test_user, unique_user_id};
use diesel::prelude::*;
use payrail_core::cache::balance::BalanceCache;
use payrail_core::cache::lock::LockService;
use payrail_core::repositories::transaction_repository::TransactionRepository;
use payrail_core::services::settlement_service::{SettlementOutcome, SettlementService};
use payrail_primitives::error::ApiError;
use payrail_primitives::models::dtos::envelope::SettlementEnvelope;
use payrail_primitives::models::dtos::payout_dto::RequestMeta;
use payrail_primitives::models::entities::enum_types::{
    CurrencyCode, TransactionStatus, TransactionType,
};
use payrail_primitives::models::entities::transaction::NewTransaction;
use payrail_primitives::schema::{transactions, users};
use payrail_primitives::utility::generate_transaction_id;
use serial_test::serial;

fn initiated_transaction(
    conn: &mut diesel::PgConnection,
    user_id: &str,
    amount: i64,
    balance_before: i64,
    lock_token: Option<&str>,
) -> String {
    let transaction_id = generate_transaction_id();
    TransactionRepository::create(
        conn,
        NewTransaction {
            transaction_id: &transaction_id,
            user_id,
            amount,
            currency: CurrencyCode::USD,
            status: TransactionStatus::Initiated,
            tx_type: TransactionType::Payout,
            balance_before,
            balance_after: balance_before - amount,
            ip_address: None,
            user_agent: None,
            source: Some("test"),
            description: None,
            lock_acquired: true,
            lock_token,
            initiated_at: chrono::Utc::now(),
        },
    )
    .expect("insert initiated transaction");
    transaction_id
}

fn envelope_for(transaction_id: &str, user_id: &str, amount: i64) -> SettlementEnvelope {
    SettlementEnvelope::new(
        transaction_id,
        user_id,
        amount,
        CurrencyCode::USD,
        RequestMeta::default(),
    )
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn settlement_deducts_persists_and_releases_the_lock() {
    let ctx = common::create_test_context().await;
    let state = &ctx.state;
    let conn = &mut state.db.get().unwrap();

    let user_id = unique_user_id("user");
    create_test_user(conn, &user_id, 1_000_000);
    BalanceCache::set(&state.redis, &user_id, 1_000_000)
        .await
        .unwrap();

    // simulate the gateway's handoff: lock held, token on the record
    let token = LockService::acquire(&state.redis, &user_id, 30_000)
        .await
        .unwrap()
        .expect("lock free");
    let transaction_id = initiated_transaction(conn, &user_id, 10_050, 1_000_000, Some(&token));

    let outcome =
        SettlementService::process_payout(state, &envelope_for(&transaction_id, &user_id, 10_050))
            .await
            .unwrap();

    match outcome {
        SettlementOutcome::Completed { new_balance } => assert_eq!(new_balance, 989_950),
        other => panic!("expected completion, got {:?}", other),
    }

    // cache reflects the deduction
    assert_eq!(
        BalanceCache::get(&state.redis, &user_id).await.unwrap(),
        Some(989_950)
    );

    // record reached `completed` with the settled balance and a latency
    let (status, balance_after, duration): (TransactionStatus, i64, Option<i64>) =
        transactions::table
            .find(&transaction_id)
            .select((
                transactions::status,
                transactions::balance_after,
                transactions::processing_duration_ms,
            ))
            .first(conn)
            .unwrap();
    assert_eq!(status, TransactionStatus::Completed);
    assert_eq!(balance_after, 989_950);
    assert!(duration.is_some());

    // durable balance reconciled, aggregates bumped
    let (balance, total_payouts, total_amount): (i64, i64, i64) = users::table
        .find(&user_id)
        .select((
            users::balance,
            users::total_payouts,
            users::total_payout_amount,
        ))
        .first(conn)
        .unwrap();
    assert_eq!(balance, 989_950);
    assert_eq!(total_payouts, 1);
    assert_eq!(total_amount, 10_050);

    // the handed-off lock was released under its token
    let still_locked = LockService::acquire(&state.redis, &user_id, 1_000)
        .await
        .unwrap();
    assert!(still_locked.is_some(), "lock should be free after settlement");
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn duplicate_delivery_settles_at_most_once() {
    let ctx = common::create_test_context().await;
    let state = &ctx.state;
    let conn = &mut state.db.get().unwrap();

    let user_id = unique_user_id("user");
    create_test_user(conn, &user_id, 500_000);
    BalanceCache::set(&state.redis, &user_id, 500_000)
        .await
        .unwrap();

    let transaction_id = initiated_transaction(conn, &user_id, 10_000, 500_000, None);
    let envelope = envelope_for(&transaction_id, &user_id, 10_000);

    let first = SettlementService::process_payout(state, &envelope)
        .await
        .unwrap();
    assert!(matches!(first, SettlementOutcome::Completed { .. }));

    // redelivery of the same message: no second deduction, no state change
    let second = SettlementService::process_payout(state, &envelope)
        .await
        .unwrap();
    assert!(matches!(second, SettlementOutcome::AlreadySettled));

    assert_eq!(
        BalanceCache::get(&state.redis, &user_id).await.unwrap(),
        Some(490_000)
    );

    let total_payouts: i64 = users::table
        .find(&user_id)
        .select(users::total_payouts)
        .first(conn)
        .unwrap();
    assert_eq!(total_payouts, 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn insufficient_cached_balance_fails_without_touching_the_cache() {
    let ctx = common::create_test_context().await;
    let state = &ctx.state;
    let conn = &mut state.db.get().unwrap();

    let user_id = unique_user_id("user");
    create_test_user(conn, &user_id, 5_000);
    BalanceCache::set(&state.redis, &user_id, 5_000).await.unwrap();

    let transaction_id = initiated_transaction(conn, &user_id, 10_000, 5_000, None);

    let outcome =
        SettlementService::process_payout(state, &envelope_for(&transaction_id, &user_id, 10_000))
            .await
            .unwrap();
    assert!(matches!(outcome, SettlementOutcome::InsufficientFunds));

    // nothing was deducted, so nothing is rolled back
    assert_eq!(
        BalanceCache::get(&state.redis, &user_id).await.unwrap(),
        Some(5_000)
    );

    let (status, error_code): (TransactionStatus, Option<String>) = transactions::table
        .find(&transaction_id)
        .select((transactions::status, transactions::error_code))
        .first(conn)
        .unwrap();
    assert_eq!(status, TransactionStatus::Failed);
    assert_eq!(error_code.as_deref(), Some("INSUFFICIENT_BALANCE"));
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn missing_transaction_is_surfaced_for_the_requeue_policy() {
    let ctx = common::create_test_context().await;
    let state = &ctx.state;

    let user_id = unique_user_id("user");
    let err = SettlementService::process_payout(
        state,
        &envelope_for("TXN_DOES_NOT_EXIST", &user_id, 100),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ApiError::TransactionNotFound(_)));
    // no cache mutation for a poison message
    assert_eq!(BalanceCache::get(&state.redis, &user_id).await.unwrap(), None);
}

#[tokio::test]
#[serial]
#[ignore = "requires local Postgres, Redis and RabbitMQ"]
async fn redelivery_during_processing_is_a_conflict() {
    let ctx = common::create_test_context().await;
    let state = &ctx.state;
    let conn = &mut state.db.get().unwrap();

    let user_id = unique_user_id("user");
    create_test_user(conn, &user_id, 500_000);
    BalanceCache::set(&state.redis, &user_id, 500_000)
        .await
        .unwrap();

    let transaction_id = initiated_transaction(conn, &user_id, 10_000, 500_000, None);
    TransactionRepository::mark_processing(conn, &transaction_id).unwrap();

    // a crashed worker left the row in `processing`; redelivery must not
    // deduct a second time
    let err =
        SettlementService::process_payout(state, &envelope_for(&transaction_id, &user_id, 10_000))
            .await
            .unwrap_err();

    assert!(matches!(err, ApiError::AlreadyProcessing(_)));
    assert_eq!(
        BalanceCache::get(&state.redis, &user_id).await.unwrap(),
        Some(500_000)
    );
}
