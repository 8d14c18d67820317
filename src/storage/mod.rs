mod errors;
mod installment_storage;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::models::{Installment, InstallmentStatus};
use crate::types::{BorrowerId, InstallmentId};

pub use errors::StoreError;
pub use installment_storage::InstallmentStorage;

/// Selects one borrower's installments by status, limited to those already due.
#[derive(Debug, Clone)]
pub struct InstallmentQuery {
    pub user_id: BorrowerId,
    pub statuses: Vec<InstallmentStatus>,
    pub due_on_or_before: DateTime<Utc>
}

/// Conditional bulk status change.
///
/// Every listed installment must currently be in `from`; either all of them move
/// to `to` or none do.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub user_id: BorrowerId,
    pub installment_ids: Vec<InstallmentId>,
    pub from: InstallmentStatus,
    pub to: InstallmentStatus
}

/// The persistence collaborator behind the loan service.
///
/// Implementations own update atomicity and must apply a given transition at most
/// once per installment, even when two payments for the same borrower race.
pub trait LoanStore: Send + Sync + 'static {
    /// Returns `StoreError::NoRows` when nothing matches.
    fn find_installments(&self, query: &InstallmentQuery) -> impl Future<Output = Result<Vec<Installment>, StoreError>> + Send;

    fn bulk_update_status(&self, transition: &StatusTransition) -> impl Future<Output = Result<(), StoreError>> + Send;
}
