pub mod allowance;
pub mod api;
pub mod audit_log;
pub mod common_utils;
pub mod configure;
pub mod consumption_guard;
pub mod id_gen;
pub mod idempotency;
pub mod ledger_store;
pub mod logger;
pub mod models;
pub mod pack_registry;
pub mod policy;
pub mod store;
