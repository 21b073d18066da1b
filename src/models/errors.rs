// Error types for the ledger / allowance engine
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    // Validation errors
    InvalidInput(String),

    // Balance errors
    InsufficientBalance { available: u64, required: u64 },

    // Entitlement errors
    NoSpinsAvailable { spins_used: u32, total_spins: u32 },

    // Lookup errors
    NotFound(String),

    // Durable-store errors (retryable)
    Storage(String),

    // Internal state disagrees with the entry log; fatal to the operation
    InvariantViolation(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::InsufficientBalance { available, required } => {
                write!(f, "Insufficient balance: have {}, need {}", available, required)
            }
            Self::NoSpinsAvailable { spins_used, total_spins } => {
                write!(f, "No spins available: used {} of {}", spins_used, total_spins)
            }
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::Storage(msg) => write!(f, "Storage failure: {}", msg),
            Self::InvariantViolation(msg) => write!(f, "Invariant violation: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::Storage(format!("codec: {}", err))
    }
}

// Error code mapping for API responses
impl LedgerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::NoSpinsAvailable { .. } => "NO_SPINS_AVAILABLE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Storage(_) => "STORAGE_FAILURE",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
        }
    }

    /// Callers should retry with backoff instead of showing the user a
    /// "no spins" style message.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::InsufficientBalance { .. }
                | Self::NoSpinsAvailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = LedgerError::InsufficientBalance { available: 30, required: 50 };
        assert_eq!(err.error_code(), "INSUFFICIENT_BALANCE");
        assert!(!err.is_retryable());
        assert!(err.is_user_error());

        let err2 = LedgerError::Storage("db offline".to_string());
        assert_eq!(err2.error_code(), "STORAGE_FAILURE");
        assert!(err2.is_retryable());
        assert!(!err2.is_user_error());
    }

    #[test]
    fn test_no_spins_is_not_storage() {
        let err = LedgerError::NoSpinsAvailable { spins_used: 3, total_spins: 3 };
        assert!(err.is_user_error());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "No spins available: used 3 of 3");
    }
}
