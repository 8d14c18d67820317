use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::engine::{identify_outstanding, settle};
use crate::models::{InstallmentStatus, LoanError, OutstandingVerdict, PaymentRequest};
use crate::storage::{InstallmentQuery, LoanStore, StatusTransition, StoreError};

/// Budget used by [`LoanService::deadline`] unless overridden with `with_timeout`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Outstanding calculation and payment reconciliation on top of a [`LoanStore`].
///
/// The service holds no mutable state. Each public operation is bounded by a deadline supplied
/// by the caller and never panics outward: unexpected faults surface as `LoanError::Store`.
pub struct LoanService<S> {
    store: Arc<S>,
    timeout: Duration
}

impl<S> Clone for LoanService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            timeout: self.timeout
        }
    }
}

impl<S: LoanStore> LoanService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            timeout: DEFAULT_TIMEOUT
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A deadline for a unit of work starting now, using the configured timeout.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.timeout
    }

    /// Computes the remaining balance and delinquency flag for a borrower.
    ///
    /// The store must answer before `deadline`, otherwise the call fails with `StoreError::Timeout`.
    ///
    /// # Errors
    /// - `Validation` if the borrower id is empty.
    /// - `NotFound` if the borrower has no pending or closed installments.
    /// - `Store` on any store failure, timeout or internal fault.
    pub async fn compute_outstanding(&self, borrower_id: &str, deadline: Instant) -> Result<OutstandingVerdict, LoanError> {
        guarded("compute_outstanding", self.fetch_outstanding(borrower_id, deadline)).await
    }

    /// Applies a lump-sum payment that must exactly equal the borrower's pending total.
    ///
    /// Both the lookup and the status update must complete before `deadline`.
    ///
    /// # Errors
    /// - `Validation` if the borrower id is empty or the amount is absent or not positive.
    /// - `NoPendingOutstanding` if there is nothing to pay.
    /// - `AmountMismatch` if the amount differs from the pending total by any amount.
    /// - `Store` on any store failure, timeout or internal fault.
    pub async fn apply_payment(&self, request: &PaymentRequest, deadline: Instant) -> Result<(), LoanError> {
        guarded("apply_payment", self.reconcile(request, deadline)).await
    }

    async fn fetch_outstanding(&self, borrower_id: &str, deadline: Instant) -> Result<OutstandingVerdict, LoanError> {
        if borrower_id.trim().is_empty() {
            return Err(LoanError::validation("borrower id must not be empty"))
        }

        let started = Instant::now();
        let query = InstallmentQuery {
            user_id: borrower_id.to_string(),
            statuses: vec![InstallmentStatus::Pending, InstallmentStatus::Closed],
            due_on_or_before: Utc::now()
        };

        let installments = match within(started, deadline, self.store.find_installments(&query)).await {
            Ok(installments) if installments.is_empty() => return Err(LoanError::not_found(borrower_id)),
            Ok(installments) => installments,
            Err(StoreError::NoRows) => return Err(LoanError::not_found(borrower_id)),
            Err(error) => {
                error!("Loading installments for borrower [{borrower_id}] failed: {error}");
                return Err(error.into())
            }
        };

        let verdict = identify_outstanding(&installments)?;

        debug!(
            "Borrower [{borrower_id}] owes [{}] across {} installments, delinquent: {}",
            verdict.remaining_outstanding, installments.len(), verdict.is_delinquent
        );

        Ok(verdict)
    }

    async fn reconcile(&self, request: &PaymentRequest, deadline: Instant) -> Result<(), LoanError> {
        let borrower_id = request.user_id.as_str();

        if borrower_id.trim().is_empty() {
            return Err(LoanError::validation("borrower id must not be empty"))
        }

        let Some(amount) = request.amount.filter(|amount| amount.is_positive()) else {
            return Err(LoanError::validation("payment amount must be greater than zero"))
        };

        let started = Instant::now();
        let query = InstallmentQuery {
            user_id: borrower_id.to_string(),
            statuses: vec![InstallmentStatus::Pending],
            due_on_or_before: Utc::now()
        };

        let pending = match within(started, deadline, self.store.find_installments(&query)).await {
            Ok(pending) if pending.is_empty() => return Err(LoanError::no_pending_outstanding(borrower_id)),
            Ok(pending) => pending,
            Err(StoreError::NoRows) => return Err(LoanError::no_pending_outstanding(borrower_id)),
            Err(error) => {
                error!("Loading pending installments for borrower [{borrower_id}] failed: {error}");
                return Err(error.into())
            }
        };

        let settlement = settle(borrower_id, amount, &pending).inspect_err(|error| warn!("{error}"))?;

        //NOTE: The external debit and any downstream notifications belong here. They must succeed
        //      before the installments are marked as paid.

        let transition = StatusTransition {
            user_id: borrower_id.to_string(),
            installment_ids: settlement.installment_ids,
            from: InstallmentStatus::Pending,
            to: InstallmentStatus::Paid
        };

        if let Err(error) = within(started, deadline, self.store.bulk_update_status(&transition)).await {
            error!("Marking installments {:?} as paid for borrower [{borrower_id}] failed: {error}", transition.installment_ids);
            return Err(error.into())
        }

        debug!("Payment of [{}] settled {} installments for borrower [{borrower_id}]", settlement.total, transition.installment_ids.len());

        Ok(())
    }
}

async fn within<T>(started: Instant, deadline: Instant, operation: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
    timeout_at(deadline, operation).await
        .map_err(|_| StoreError::Timeout { after: deadline.saturating_duration_since(started) })?
}

async fn guarded<T>(operation: &str, future: impl Future<Output = Result<T, LoanError>>) -> Result<T, LoanError> {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(&*payload);
            error!("Unexpected fault in {operation}: {message}");
            Err(StoreError::Fault(message).into())
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
