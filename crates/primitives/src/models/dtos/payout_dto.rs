use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PayoutRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_user_id"))]
    pub user_id: String,

    /// Decimal amount with at most two fractional digits; precision and
    /// bounds are enforced in the service layer against configuration.
    pub amount: f64,

    pub currency: Option<String>,

    #[validate(length(max = 256))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayoutResponse {
    pub success: bool,
    pub transaction_id: String,
    pub status: String,
    pub amount: f64,
    pub currency: String,
    pub message: String,
}

/// Request metadata captured at the HTTP edge and carried through the
/// transaction record and the settlement envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub source: Option<String>,
}

fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    let ok = user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("user_id_invalid_character"))
    }
}
