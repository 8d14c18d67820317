use crate::models::{Installment, InstallmentStatus, LoanError, OutstandingVerdict};
use crate::storage::StoreError;
use crate::types::Amount;

/// More than this many simultaneously pending installments marks a borrower delinquent.
pub const DELINQUENCY_THRESHOLD: usize = 2;

/// Derives the balance and delinquency verdict from a borrower's `PENDING` and `CLOSED` installments.
///
/// A set where every record is closed is fully settled. Otherwise the remaining balance is the
/// exact sum of the pending amounts, and the borrower is delinquent once the pending count
/// exceeds [`DELINQUENCY_THRESHOLD`], regardless of amounts.
pub fn identify_outstanding(installments: &[Installment]) -> Result<OutstandingVerdict, LoanError> {
    let mut total_pending = 0;
    let mut total_closed = 0;
    let mut pending_amount = Amount::zero();

    for installment in installments {
        match installment.status {
            InstallmentStatus::Pending => {
                pending_amount = pending_amount.checked_add(installment.amount)
                    .ok_or_else(|| StoreError::Fault("pending total overflowed".to_string()))?;
                total_pending += 1;
            },
            InstallmentStatus::Closed => total_closed += 1,
            InstallmentStatus::Paid => {}
        }
    }

    //NOTE: Settled means every returned record is closed, not merely that none are pending
    if total_closed == installments.len() {
        return Ok(OutstandingVerdict::settled())
    }

    Ok(OutstandingVerdict {
        remaining_outstanding: pending_amount,
        is_delinquent: total_pending > DELINQUENCY_THRESHOLD
    })
}
