mod errors;
mod installment;
mod payment;
mod request;

use serde::Deserialize;

pub use errors::{ErrorKind, LoanError};
pub use installment::{Installment, NewInstallment};
pub use payment::{OutstandingVerdict, PaymentRequest};
pub use request::{Outcome, Request, RequestKind};

/// Lifecycle of a single installment.
///
/// `Pending` is assigned by the store at creation. `Paid` is only reached through a
/// reconciled payment, and `Closed` is set outside this crate (write-off, cycle close).
/// Neither terminal state ever transitions back.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstallmentStatus {
    Pending,
    Paid,
    Closed
}
