use std::sync::Arc;

use tokio::spawn;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

use crate::engine::LoanService;
use crate::models::{Outcome, Request, RequestKind};
use crate::storage::LoanStore;
use crate::types::BorrowerId;

/// Serializes every request for one borrower, in the order it was accepted.
pub struct BorrowerActor {
    sender: mpsc::UnboundedSender<Request>,
    handle: JoinHandle<()>
}

impl BorrowerActor {
    /// Spawns a new actor that reports each outcome on `results`.
    pub fn new<S: LoanStore>(borrower_id: BorrowerId, service: Arc<LoanService<S>>, results: mpsc::UnboundedSender<Outcome>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Request>();

        let handle = spawn(async move {
            while let Some(request) = receiver.recv().await {
                let deadline = service.deadline();
                let result = match request.kind {
                    RequestKind::Outstanding => service.compute_outstanding(&request.user_id, deadline).await.map(Some),
                    RequestKind::Payment => service.apply_payment(&request.payment_request(), deadline).await.map(|_| None)
                };

                if let Err(error) = &result {
                    debug!("Request [{}]:[{}] for borrower [{}] failed: {error}", request.sequence, request.kind, request.user_id);
                }

                if results.send(Outcome::new(&request, result)).is_err() {
                    warn!("Outcome channel closed, borrower actor [{borrower_id}] stopping early");
                    break;
                }
            }
        });

        Self { sender, handle }
    }

    /// Queues a request. Returns `false` if the actor is no longer running.
    pub fn accept(&self, request: Request) -> bool {
        self.sender.send(request).is_ok()
    }

    /// Closes the queue and waits until every accepted request has been answered.
    pub async fn despawn(self) -> Result<(), JoinError> {
        drop(self.sender);
        self.handle.await
    }
}
