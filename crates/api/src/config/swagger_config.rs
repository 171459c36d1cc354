use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::initiate_payout::initiate_payout,
        crate::handlers::get_transaction::get_transaction,
        crate::handlers::transaction_audit::transaction_audit,
        crate::handlers::user_balance::user_balance,
        crate::handlers::user_history::user_history,
        crate::handlers::health::health_check,
        crate::handlers::health::health_detailed,
        crate::handlers::health::readiness,
        crate::handlers::health::liveness,
    ),
    components(schemas(
        payrail_primitives::models::dtos::payout_dto::PayoutRequest,
        payrail_primitives::models::dtos::payout_dto::PayoutResponse,
        payrail_primitives::models::dtos::transaction_dto::TransactionDto,
        payrail_primitives::models::dtos::transaction_dto::TransactionResponse,
        payrail_primitives::models::dtos::transaction_dto::BalanceResponse,
        payrail_primitives::models::dtos::transaction_dto::HistoryResponse,
        payrail_primitives::models::entities::enum_types::CurrencyCode,
        payrail_primitives::models::entities::enum_types::TransactionStatus,
        payrail_primitives::models::entities::enum_types::TransactionType,
    )),
    tags(
        (name = "Payout", description = "Instant payout pipeline"),
        (name = "Health", description = "Service health")
    )
)]
pub struct ApiDoc;
