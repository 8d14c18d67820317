use crate::models::{Installment, LoanError};
use crate::storage::StoreError;
use crate::types::{Amount, InstallmentId};

/// The installments a matched payment will settle.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settlement {
    pub installment_ids: Vec<InstallmentId>,
    pub total: Amount
}

/// Matches a payment against every pending installment of a borrower.
///
/// Only an exact match is accepted; overpayments and partial payments are both rejected.
pub fn settle(borrower_id: &str, amount: Amount, pending: &[Installment]) -> Result<Settlement, LoanError> {
    let mut total = Amount::zero();
    let mut installment_ids = Vec::with_capacity(pending.len());

    for installment in pending {
        total = total.checked_add(installment.amount)
            .ok_or_else(|| StoreError::Fault("pending total overflowed".to_string()))?;
        installment_ids.push(installment.id);
    }

    if amount != total {
        return Err(LoanError::amount_mismatch(borrower_id, total, amount))
    }

    Ok(Settlement { installment_ids, total })
}
