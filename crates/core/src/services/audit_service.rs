use crate::repositories::audit_repository::AuditLogRepository;
use payrail_primitives::models::app_state::AppState;
use payrail_primitives::models::entities::audit_log::NewAuditLog;
use payrail_primitives::models::entities::enum_types::AuditAction;
use tracing::warn;
use uuid::Uuid;

pub struct AuditService;

impl AuditService {
    /// Appends one audit entry. The trail is advisory: a failed write is
    /// logged and swallowed, it never aborts the operation being audited.
    pub async fn record(
        state: &AppState,
        transaction_id: Option<&str>,
        user_id: Option<&str>,
        action: AuditAction,
        details: serde_json::Value,
    ) {
        let new_log = NewAuditLog {
            id: Uuid::new_v4(),
            transaction_id: transaction_id.map(|s| s.to_string()),
            user_id: user_id.map(|s| s.to_string()),
            action: action.to_string(),
            details,
        };

        let result = state
            .db
            .get()
            .map_err(|e| e.to_string())
            .and_then(|mut conn| {
                AuditLogRepository::create(&mut conn, new_log).map_err(|e| e.to_string())
            });

        if let Err(e) = result {
            warn!(action = %action, error = %e, "audit write failed");
        }
    }
}
