pub mod get_transaction;
pub mod health;
pub mod initiate_payout;
pub mod transaction_audit;
pub mod user_balance;
pub mod user_history;
