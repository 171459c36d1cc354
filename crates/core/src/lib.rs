pub mod bootstrap;
pub mod cache;
pub mod mq;
pub mod repositories;
pub mod services;
