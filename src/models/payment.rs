use crate::types::{Amount, BorrowerId};

/// Balance and delinquency verdict for one borrower.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct OutstandingVerdict {
    pub remaining_outstanding: Amount,
    pub is_delinquent: bool
}

impl OutstandingVerdict {
    pub fn settled() -> Self {
        Self {
            remaining_outstanding: Amount::zero(),
            is_delinquent: false
        }
    }
}

/// A lump-sum payment against every pending installment of a borrower.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub user_id: BorrowerId,
    /// Absent amounts are rejected the same way as a zero amount.
    pub amount: Option<Amount>
}

impl PaymentRequest {
    pub fn new(user_id: impl Into<BorrowerId>, amount: Option<Amount>) -> Self {
        Self {
            user_id: user_id.into(),
            amount
        }
    }
}
