use diesel::prelude::*;
use payrail_primitives::error::ApiError;
use payrail_primitives::models::entities::audit_log::{AuditLog, NewAuditLog};
use payrail_primitives::schema::audit_logs;

pub struct AuditLogRepository;

impl AuditLogRepository {
    pub fn create(conn: &mut PgConnection, new_log: NewAuditLog) -> Result<(), ApiError> {
        diesel::insert_into(audit_logs::table)
            .values(&new_log)
            .execute(conn)
            .map_err(ApiError::Database)?;
        Ok(())
    }

    pub fn find_by_transaction(
        conn: &mut PgConnection,
        transaction_id: &str,
    ) -> Result<Vec<AuditLog>, ApiError> {
        audit_logs::table
            .filter(audit_logs::transaction_id.eq(transaction_id))
            .order(audit_logs::created_at.asc())
            .load::<AuditLog>(conn)
            .map_err(ApiError::Database)
    }

}
