use diesel::prelude::*;
use payrail_primitives::models::entities::enum_types::{AccountStatus, CurrencyCode};
use payrail_primitives::schema::users;
use uuid::Uuid;

/// Unique per test run so parallel-ish reruns never collide on user ids.
pub fn unique_user_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

pub fn create_test_user(
    conn: &mut PgConnection,
    user_id: &str,
    balance_minor: i64,
    status: AccountStatus,
) {
    diesel::insert_into(users::table)
        .values((
            users::user_id.eq(user_id),
            users::display_name.eq(format!("Test {}", user_id)),
            users::email.eq(format!("{}@example.com", user_id)),
            users::balance.eq(balance_minor),
            users::currency.eq(CurrencyCode::USD),
            users::status.eq(status),
            users::total_payouts.eq(0_i64),
            users::total_payout_amount.eq(0_i64),
        ))
        .execute(conn)
        .expect("insert test user");
}
