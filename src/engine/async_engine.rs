use crate::actors::BorrowerActor;
use crate::engine::LoanService;
use crate::models::{Outcome, Request};
use crate::storage::LoanStore;
use crate::types::BorrowerId;
use csv::{ReaderBuilder, Trim};
use futures::future::join_all;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{spawn_blocking, JoinHandle};
use tracing::error;

/// Batch driver that answers a CSV file of outstanding and payment requests.
///
/// Requests for one borrower run strictly in file order, different borrowers run concurrently.
pub struct ReconciliationEngine<S> {
    service: Arc<LoanService<S>>,
    backpressure: usize
}

impl<S: LoanStore> ReconciliationEngine<S> {
    pub fn new(service: Arc<LoanService<S>>) -> Self {
        Self {
            service,
            backpressure: 256
        }
    }

    /// Processes every request in the file and returns the outcomes in input order.
    pub async fn run(&self, path: &str) -> anyhow::Result<Vec<Outcome>> {
        let (sender, receiver) = mpsc::channel::<Request>(self.backpressure);
        let csv_handle = self.spawn_csv_reader(path.to_string(), sender);
        let outcomes = self.process_requests(receiver).await;

        if let Err(error) = csv_handle.await {
            error!("CSV ingestion failed: {error}");
        }

        outcomes
    }

    fn spawn_csv_reader(&self, path: String, sender: mpsc::Sender<Request>) -> JoinHandle<()> {
        spawn_blocking(move || {
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(error) => {
                    error!("Error opening CSV at path: {path} | {error}");
                    return;
                }
            };

            let mut reader = ReaderBuilder::new()
                .trim(Trim::All)
                .flexible(true)
                .from_reader(BufReader::new(file));

            for (sequence, result) in reader.deserialize::<Request>().enumerate() {
                match result {
                    Ok(mut request) => {
                        request.sequence = sequence as u64;

                        if sender.blocking_send(request).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        error!("CSV deserialization error: {error}");
                    }
                }
            }
        })
    }

    async fn process_requests(&self, mut receiver: mpsc::Receiver<Request>) -> anyhow::Result<Vec<Outcome>> {
        let (results_sender, mut results_receiver) = mpsc::unbounded_channel::<Outcome>();
        let mut actors = HashMap::<BorrowerId, BorrowerActor>::new();

        while let Some(request) = receiver.recv().await {
            let actor = actors.entry(request.user_id.clone()).or_insert_with(|| {
                BorrowerActor::new(request.user_id.clone(), self.service.clone(), results_sender.clone())
            });

            let (sequence, user_id) = (request.sequence, request.user_id.clone());

            if !actor.accept(request) {
                error!("Borrower actor [{user_id}] could not accept request [{sequence}]");
            }
        }

        let despawns = actors.into_values().map(|actor| actor.despawn());

        for result in join_all(despawns).await {
            if let Err(error) = result {
                error!("A borrower actor did not despawn gracefully: {error:?}");
            }
        }

        drop(results_sender);

        let mut outcomes = Vec::new();

        while let Some(outcome) = results_receiver.recv().await {
            outcomes.push(outcome);
        }

        outcomes.sort_by_key(|outcome| outcome.sequence);

        Ok(outcomes)
    }
}
