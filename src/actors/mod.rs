mod borrower_actor;

pub use borrower_actor::BorrowerActor;
