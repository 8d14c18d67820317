use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::InstallmentStatus;
use crate::types::{Amount, BorrowerId, InstallmentId};

/// One scheduled repayment owned by the loan store.
#[derive(Debug, Clone, PartialEq)]
pub struct Installment {
    /// Assigned by the store, unique across borrowers.
    pub id: InstallmentId,
    pub user_id: BorrowerId,
    /// Immutable once created.
    pub amount: Amount,
    pub status: InstallmentStatus,
    /// Only used as a query filter.
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>
}

/// A single row of an installment import file.
///
/// Identifiers and audit timestamps are left to the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInstallment {
    pub user_id: BorrowerId,
    pub amount: Amount,
    pub status: InstallmentStatus,
    pub due_date: DateTime<Utc>
}
