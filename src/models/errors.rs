use crate::storage::StoreError;
use crate::types::{Amount, BorrowerId};
use thiserror::Error;

/// Stable discriminator for [`LoanError`].
///
/// Callers branch on the kind rather than on the error value, and every kind
/// maps to its own external response code.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    NoPendingOutstanding,
    AmountMismatch,
    Store
}

impl ErrorKind {
    pub const SUCCESS_CODE: &'static str = "0000";

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "0001",
            ErrorKind::NotFound => "0002",
            ErrorKind::AmountMismatch => "0003",
            ErrorKind::NoPendingOutstanding => "0004",
            ErrorKind::Store => "9999"
        }
    }
}

#[derive(Debug, Error)]
pub enum LoanError {
    #[error("Validation failed: {reason}")]
    Validation {
        reason: String
    },
    #[error("No installments found for borrower [{borrower_id}]")]
    NotFound {
        borrower_id: BorrowerId
    },
    #[error("No pending installments to pay for borrower [{borrower_id}]")]
    NoPendingOutstanding {
        borrower_id: BorrowerId
    },
    #[error("Payment [{received}] does not equal pending total [{expected}] for borrower [{borrower_id}]")]
    AmountMismatch {
        borrower_id: BorrowerId,
        expected: Amount,
        received: Amount
    },
    #[error("Loan store failure: {0}")]
    Store(#[from] StoreError)
}

impl LoanError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation { reason: reason.into() }
    }

    pub fn not_found(borrower_id: &str) -> Self {
        Self::NotFound { borrower_id: borrower_id.to_string() }
    }

    pub fn no_pending_outstanding(borrower_id: &str) -> Self {
        Self::NoPendingOutstanding { borrower_id: borrower_id.to_string() }
    }

    pub fn amount_mismatch(borrower_id: &str, expected: Amount, received: Amount) -> Self {
        Self::AmountMismatch {
            borrower_id: borrower_id.to_string(),
            expected,
            received
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LoanError::Validation { .. } => ErrorKind::Validation,
            LoanError::NotFound { .. } => ErrorKind::NotFound,
            LoanError::NoPendingOutstanding { .. } => ErrorKind::NoPendingOutstanding,
            LoanError::AmountMismatch { .. } => ErrorKind::AmountMismatch,
            LoanError::Store(_) => ErrorKind::Store
        }
    }
}
