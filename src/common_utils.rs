use chrono::Utc;

/// Get current timestamp in milliseconds (UTC)
pub fn get_current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Calendar day for a business-local timestamp, as days since Unix epoch.
/// `utc_offset_minutes` shifts the day boundary to the business's timezone.
pub fn day_key(as_of_ms: i64, utc_offset_minutes: i32) -> i32 {
    let local_secs = as_of_ms / 1_000 + (utc_offset_minutes as i64) * 60;
    local_secs.div_euclid(86_400) as i32
}

pub const MS_PER_HOUR: i64 = 3_600_000;
pub const MS_PER_DAY: i64 = 86_400_000;
