use std::time::Duration;

use thiserror::Error;

use crate::types::InstallmentId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store error: no rows")]
    NoRows,
    #[error("Store error: no response within {after:?}")]
    Timeout {
        after: Duration
    },
    #[error("Store error: installment [{installment_id}] is not in the expected status")]
    Conflict {
        installment_id: InstallmentId
    },
    #[error("Store error: unavailable: {0}")]
    Unavailable(String),
    #[error("Store error: unexpected fault: {0}")]
    Fault(String)
}
