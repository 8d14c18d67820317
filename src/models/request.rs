use std::fmt;
use std::fmt::{Display, Formatter};

use serde::Deserialize;

use crate::models::{ErrorKind, LoanError, OutstandingVerdict, PaymentRequest};
use crate::types::{Amount, BorrowerId};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Outstanding,
    Payment
}

impl Display for RequestKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Outstanding => write!(formatter, "outstanding"),
            RequestKind::Payment => write!(formatter, "payment")
        }
    }
}

/// A single row of a request batch file.
///
/// `amount` is only read for payments.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub user_id: BorrowerId,
    pub amount: Option<Amount>,
    /// Position in the batch, assigned by the reader.
    #[serde(skip)]
    pub sequence: u64
}

impl Request {
    pub fn payment_request(&self) -> PaymentRequest {
        PaymentRequest::new(self.user_id.clone(), self.amount)
    }
}

/// The answer to one [`Request`], carrying the external response code.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Outcome {
    pub sequence: u64,
    pub kind: RequestKind,
    pub user_id: BorrowerId,
    pub code: &'static str,
    pub verdict: Option<OutstandingVerdict>
}

impl Outcome {
    pub fn new(request: &Request, result: Result<Option<OutstandingVerdict>, LoanError>) -> Self {
        let (code, verdict) = match result {
            Ok(verdict) => (ErrorKind::SUCCESS_CODE, verdict),
            Err(error) => (error.kind().code(), None)
        };

        Self {
            sequence: request.sequence,
            kind: request.kind,
            user_id: request.user_id.clone(),
            code,
            verdict
        }
    }
}
