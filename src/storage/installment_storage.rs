use crate::models::{Installment, NewInstallment};
use crate::storage::{InstallmentQuery, LoanStore, StatusTransition, StoreError};
use crate::types::BorrowerId;
use chrono::Utc;
use csv::{ReaderBuilder, Trim};
use dashmap::DashMap;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// In-memory loan store.
///
/// Installments are grouped per borrower so that a bulk transition happens while
/// holding a single map entry, which makes it atomic with respect to concurrent
/// readers and writers of that borrower.
pub struct InstallmentStorage {
    ledgers: DashMap<BorrowerId, Vec<Installment>>,
    sequence: AtomicU64
}

impl InstallmentStorage {
    pub fn new() -> Self {
        Self {
            ledgers: DashMap::new(),
            sequence: AtomicU64::new(0)
        }
    }

    /// Stores a new installment, assigning its id and audit timestamps.
    pub fn insert(&self, installment: NewInstallment) -> Installment {
        let now = Utc::now();
        let stored = Installment {
            id: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            user_id: installment.user_id,
            amount: installment.amount,
            status: installment.status,
            due_date: installment.due_date,
            created_at: now,
            updated_at: now
        };

        self.ledgers.entry(stored.user_id.clone())
            .or_default()
            .push(stored.clone());

        stored
    }

    /// Loads `user_id,amount,status,due_date` rows. Any malformed row aborts the import.
    pub fn import_csv<R: Read>(&self, reader: R) -> Result<usize, csv::Error> {
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .from_reader(reader);

        let rows = reader.deserialize::<NewInstallment>().collect::<Result<Vec<_>, _>>()?;
        let count = rows.len();

        for row in rows {
            self.insert(row);
        }

        debug!("Imported {count} installments");

        Ok(count)
    }

    /// Snapshot of every installment a borrower holds, regardless of status.
    #[cfg(test)]
    pub fn installments(&self, user_id: &str) -> Vec<Installment> {
        self.ledgers.get(user_id)
            .map(|ledger| ledger.value().clone())
            .unwrap_or_default()
    }
}

impl Default for InstallmentStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl LoanStore for InstallmentStorage {
    async fn find_installments(&self, query: &InstallmentQuery) -> Result<Vec<Installment>, StoreError> {
        let Some(ledger) = self.ledgers.get(&query.user_id) else {
            return Err(StoreError::NoRows)
        };

        let mut found: Vec<Installment> = ledger.iter()
            .filter(|installment| query.statuses.contains(&installment.status))
            .filter(|installment| installment.due_date <= query.due_on_or_before)
            .cloned()
            .collect();

        if found.is_empty() {
            return Err(StoreError::NoRows)
        }

        found.sort_by_key(|installment| (installment.due_date, installment.id));

        Ok(found)
    }

    async fn bulk_update_status(&self, transition: &StatusTransition) -> Result<(), StoreError> {
        let Some(mut ledger) = self.ledgers.get_mut(&transition.user_id) else {
            return match transition.installment_ids.first() {
                Some(&installment_id) => Err(StoreError::Conflict { installment_id }),
                None => Ok(())
            }
        };

        let mut positions = Vec::with_capacity(transition.installment_ids.len());

        for &installment_id in &transition.installment_ids {
            let position = ledger.iter()
                .position(|installment| installment.id == installment_id && installment.status == transition.from)
                .ok_or(StoreError::Conflict { installment_id })?;

            positions.push(position);
        }

        let now = Utc::now();

        for position in positions {
            let installment = &mut ledger[position];
            installment.status = transition.to;
            installment.updated_at = now;
        }

        Ok(())
    }
}
