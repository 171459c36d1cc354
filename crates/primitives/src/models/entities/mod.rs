pub mod audit_log;
pub mod enum_types;
pub mod transaction;
pub mod user;
