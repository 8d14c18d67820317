mod amount;
mod errors;

pub use amount::Amount;
pub use errors::AmountError;

pub type BorrowerId = String;
pub type InstallmentId = u64;
