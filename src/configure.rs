use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub data_dir: String,
    pub log_file: String,
    pub log_to_file: bool,
    pub log_level: String,
    /// Base daily spins when a business has no override.
    pub default_base_spins: u32,
    /// Day-boundary offset from UTC for business-local calendar days.
    pub business_utc_offset_minutes: i32,
    /// Durable idempotency records older than this are GC-eligible.
    pub idempotency_retention_hours: u32,
    /// In-memory idempotency cache entries.
    pub idempotency_cache_size: usize,
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    let s = Config::builder()
        // Set defaults
        .set_default("data_dir", "data/spinledger")?
        .set_default("log_file", "log/spinledger.log")?
        .set_default("log_to_file", false)?
        .set_default("log_level", "info")?
        .set_default("default_base_spins", 3)?
        .set_default("business_utc_offset_minutes", 0)?
        .set_default("idempotency_retention_hours", 72)?
        .set_default("idempotency_cache_size", 10_000)?
        // Add configuration from a file
        .add_source(File::with_name("config/config.yaml").required(false))
        // Add configuration from environment variables
        .add_source(config::Environment::with_prefix("APP"))
        .build()?;

    s.try_deserialize()
}
