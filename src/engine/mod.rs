mod async_engine;
mod loan_service;
mod outstanding;
mod reconcile;
#[cfg(test)]
mod tests;

pub use async_engine::ReconciliationEngine;
pub use loan_service::{LoanService, DEFAULT_TIMEOUT};
pub use outstanding::identify_outstanding;
pub use reconcile::settle;
