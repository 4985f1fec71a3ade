//! Crate-wide error taxonomy.
//!
//! Every failure a mutating operation can surface maps onto one of these
//! variants. Boundary layers convert them to structured responses; none of
//! them may leave wallet or ledger state partially applied.

use rust_decimal::Decimal;

/// Result type for all ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors surfaced by the settlement core.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed input: bad amount, bad payout-method fields, percentage out
    /// of range. Nothing was mutated.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Attempted transition from a non-pending state (double approval,
    /// re-processing, conflicting re-activation). Treated as "already
    /// handled" by callers.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A debit would exceed the current balance. Debits are rejected, never
    /// clamped.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    /// Referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Gateway signature check failed; the event never reached business
    /// logic.
    #[error("unverified gateway event: {0}")]
    UnverifiedEvent(String),

    /// Withdrawal approval requires an external transaction id.
    #[error("transaction id is required to approve a withdrawal")]
    MissingTransactionId,

    /// Malformed event payload from the gateway.
    #[error("malformed gateway event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    /// Storage failure. Rolled back; surfaced as a generic server error at
    /// the boundary.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl LedgerError {
    /// Shorthand for a `NotFound` with a displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True when the error is a client-side fault rather than a server
    /// fault, for boundary status mapping.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_balance_display() {
        let err = LedgerError::InsufficientBalance {
            requested: dec!(500),
            available: dec!(300),
        };
        assert_eq!(
            err.to_string(),
            "insufficient balance: requested 500, available 300"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(LedgerError::Validation("bad amount".into()).is_client_error());
        assert!(LedgerError::MissingTransactionId.is_client_error());
        assert!(!LedgerError::Storage(sqlx::Error::RowNotFound).is_client_error());
    }
}
