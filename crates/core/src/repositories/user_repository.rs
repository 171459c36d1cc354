use chrono::Utc;
use diesel::prelude::*;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::entities::user::User;
use payrail_primitives::schema::users;

pub struct UserRepository;

impl UserRepository {
    pub fn find_by_id(conn: &mut PgConnection, user_id: &str) -> Result<Option<User>, ApiError> {
        users::table
            .find(user_id)
            .first::<User>(conn)
            .optional()
            .map_err(ApiError::Database)
    }

    /// Reconciles the durable balance from the cache after a completed
    /// settlement and bumps the payout aggregates. Single-row atomic update.
    pub fn apply_settlement(
        conn: &mut PgConnection,
        user_id: &str,
        new_balance: i64,
        amount: i64,
    ) -> Result<(), ApiError> {
        let now = Utc::now();

        diesel::update(users::table.find(user_id))
            .set((
                users::balance.eq(new_balance),
                users::total_payouts.eq(users::total_payouts + 1),
                users::total_payout_amount.eq(users::total_payout_amount + amount),
                users::last_payout_at.eq(now),
                users::updated_at.eq(now),
            ))
            .execute(conn)
            .map_err(ApiError::Database)?;

        Ok(())
    }
}
