use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Time-ordered 64-bit ID generator for ledger entries, packs and events.
/// Layout:
/// - 48 bits: timestamp (milliseconds)
/// - 16 bits: randomness / counter
///
/// Within one generator the sequence is strictly increasing: a repeated
/// millisecond (or a clock regression) falls back to incrementing the last
/// value, which stays unique and keeps the sort order.
pub struct TimeOrderedIdGen {
    last_val: u64,
}

impl Default for TimeOrderedIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeOrderedIdGen {
    pub fn new() -> Self {
        Self { last_val: 0 }
    }

    pub fn generate(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(std::time::Duration::ZERO)
            .as_millis() as u64;

        let ts_part = now << 16;

        if ts_part > self.last_val {
            let rand_part = rand::thread_rng().gen::<u16>() as u64;
            self.last_val = ts_part | rand_part;
        } else {
            self.last_val = self.last_val.wrapping_add(1);
        }
        self.last_val
    }

    /// Extract the embedded millisecond timestamp.
    pub fn timestamp_ms(val: u64) -> u64 {
        val >> 16
    }
}
