use super::{identify_outstanding, settle, LoanService, ReconciliationEngine};

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;
use tempfile::NamedTempFile;
use tokio::time::{sleep, Instant};

use crate::models::{ErrorKind, Installment, InstallmentStatus, LoanError, NewInstallment, PaymentRequest, RequestKind};
use crate::storage::{InstallmentQuery, InstallmentStorage, LoanStore, StatusTransition, StoreError};
use crate::types::Amount;

fn past_due(days_ago: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(days_ago)
}

fn installment(id: u64, status: InstallmentStatus, amount: &str) -> Result<Installment> {
    Ok(Installment {
        id,
        user_id: "abc".to_string(),
        amount: Amount::from_str(amount)?,
        status,
        due_date: past_due(7),
        created_at: past_due(30),
        updated_at: past_due(30)
    })
}

fn installments(status: InstallmentStatus, amounts: &[&str]) -> Result<Vec<Installment>> {
    amounts.iter().enumerate()
        .map(|(index, amount)| installment(index as u64 + 1, status, amount))
        .collect()
}

fn seeded_storage(user_id: &str, rows: &[(InstallmentStatus, &str)]) -> Result<Arc<InstallmentStorage>> {
    let storage = Arc::new(InstallmentStorage::new());

    for (index, (status, amount)) in rows.iter().enumerate() {
        storage.insert(NewInstallment {
            user_id: user_id.to_string(),
            amount: Amount::from_str(amount)?,
            status: *status,
            due_date: past_due(7 * (rows.len() - index) as i64)
        });
    }

    Ok(storage)
}

fn amount(value: &str) -> Result<Amount> {
    Ok(Amount::from_str(value)?)
}

enum Fault {
    Fail,
    Stall,
    Panic,
    Empty
}

/// Store whose lookups misbehave in a fixed way.
struct FaultyStore {
    fault: Fault
}

impl LoanStore for FaultyStore {
    async fn find_installments(&self, _query: &InstallmentQuery) -> Result<Vec<Installment>, StoreError> {
        match self.fault {
            Fault::Fail => Err(StoreError::Unavailable("connection reset".to_string())),
            Fault::Stall => {
                sleep(Duration::from_secs(5)).await;
                Ok(Vec::new())
            },
            Fault::Panic => panic!("classification defect"),
            Fault::Empty => Ok(Vec::new())
        }
    }

    async fn bulk_update_status(&self, _transition: &StatusTransition) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store that reads from memory but rejects every status update.
struct ReadOnlyStore {
    inner: Arc<InstallmentStorage>
}

impl LoanStore for ReadOnlyStore {
    async fn find_installments(&self, query: &InstallmentQuery) -> Result<Vec<Installment>, StoreError> {
        self.inner.find_installments(query).await
    }

    async fn bulk_update_status(&self, _transition: &StatusTransition) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("read only replica".to_string()))
    }
}

#[test]
fn test_pending_installments_beyond_threshold_are_delinquent() -> Result<()> {
    let verdict = identify_outstanding(&installments(InstallmentStatus::Pending, &["10", "13", "5", "2"])?)?;

    assert_eq!(verdict.remaining_outstanding, Amount::from(dec!(30)));
    assert!(verdict.is_delinquent);

    Ok(())
}

#[test]
fn test_all_closed_installments_are_settled() -> Result<()> {
    let verdict = identify_outstanding(&installments(InstallmentStatus::Closed, &["10", "13", "5"])?)?;

    assert_eq!(verdict.remaining_outstanding, Amount::zero());
    assert!(!verdict.is_delinquent);

    Ok(())
}

#[test]
fn test_delinquency_flips_only_above_two_pending() -> Result<()> {
    for pending_count in 0..=6 {
        let mut records = vec![installment(100, InstallmentStatus::Closed, "50")?];
        let mut expected = Amount::zero();

        for id in 0..pending_count {
            records.push(installment(id, InstallmentStatus::Pending, "10.01")?);
            expected = expected.checked_add(amount("10.01")?).unwrap_or_default();
        }

        let verdict = identify_outstanding(&records)?;

        assert_eq!(verdict.is_delinquent, pending_count > 2, "pending count {pending_count}");
        assert_eq!(verdict.remaining_outstanding, expected, "pending count {pending_count}");
    }

    Ok(())
}

#[test]
fn test_paid_records_are_neither_pending_nor_closed() -> Result<()> {
    let verdict = identify_outstanding(&installments(InstallmentStatus::Paid, &["10", "13"])?)?;

    assert_eq!(verdict.remaining_outstanding, Amount::zero());
    assert!(!verdict.is_delinquent);

    Ok(())
}

#[test]
fn test_settle_accepts_exact_total_only() -> Result<()> {
    let pending = installments(InstallmentStatus::Pending, &["20", "5"])?;

    let settlement = settle("abc", amount("25.00")?, &pending)?;

    assert_eq!(settlement.installment_ids, vec![1, 2]);
    assert_eq!(settlement.total, Amount::from(dec!(25)));

    for near_miss in ["24.9999", "25.0001", "23", "26"] {
        let result = settle("abc", amount(near_miss)?, &pending);

        assert!(matches!(result, Err(LoanError::AmountMismatch { .. })), "payment {near_miss}");
    }

    Ok(())
}

#[tokio::test]
async fn test_service_computes_outstanding_from_store() -> Result<()> {
    let storage = seeded_storage("abc", &[
        (InstallmentStatus::Pending, "10"),
        (InstallmentStatus::Pending, "13"),
        (InstallmentStatus::Pending, "5"),
        (InstallmentStatus::Pending, "2"),
        (InstallmentStatus::Paid, "40")
    ])?;
    let service = LoanService::new(storage);

    let first = service.compute_outstanding("abc", service.deadline()).await?;
    let second = service.compute_outstanding("abc", service.deadline()).await?;

    assert_eq!(first.remaining_outstanding, Amount::from(dec!(30)));
    assert!(first.is_delinquent);
    assert_eq!(first, second);

    Ok(())
}

#[tokio::test]
async fn test_service_rejects_empty_borrower_id() {
    let service = LoanService::new(Arc::new(InstallmentStorage::new()));

    let outstanding = service.compute_outstanding("", service.deadline()).await;
    let payment = service.apply_payment(&PaymentRequest::new("", Some(Amount::from(dec!(25)))), service.deadline()).await;

    assert!(matches!(outstanding, Err(LoanError::Validation { .. })));
    assert!(matches!(payment, Err(LoanError::Validation { .. })));
}

#[tokio::test]
async fn test_service_reports_unknown_borrower_as_not_found() {
    let service = LoanService::new(Arc::new(InstallmentStorage::new()));

    let result = service.compute_outstanding("missing", service.deadline()).await;

    assert!(matches!(result, Err(LoanError::NotFound { .. })));
}

#[tokio::test]
async fn test_service_treats_empty_results_as_missing_data() {
    let service = LoanService::new(Arc::new(FaultyStore { fault: Fault::Empty }));

    let outstanding = service.compute_outstanding("abc", service.deadline()).await;
    let payment = service.apply_payment(&PaymentRequest::new("abc", Some(Amount::from(dec!(25)))), service.deadline()).await;

    assert!(matches!(outstanding, Err(LoanError::NotFound { .. })));
    assert!(matches!(payment, Err(LoanError::NoPendingOutstanding { .. })));
}

#[tokio::test]
async fn test_service_settles_exact_payment() -> Result<()> {
    let storage = seeded_storage("abc", &[
        (InstallmentStatus::Pending, "20"),
        (InstallmentStatus::Pending, "5")
    ])?;
    let service = LoanService::new(storage.clone());

    service.apply_payment(&PaymentRequest::new("abc", Some(amount("25")?)), service.deadline()).await?;

    assert!(storage.installments("abc").iter().all(|installment| installment.status == InstallmentStatus::Paid));

    let repeated = service.apply_payment(&PaymentRequest::new("abc", Some(amount("25")?)), service.deadline()).await;

    assert!(matches!(repeated, Err(LoanError::NoPendingOutstanding { .. })));

    Ok(())
}

#[tokio::test]
async fn test_service_rejects_mismatched_payment_without_side_effects() -> Result<()> {
    let storage = seeded_storage("abc", &[
        (InstallmentStatus::Pending, "10"),
        (InstallmentStatus::Pending, "13")
    ])?;
    let service = LoanService::new(storage.clone());

    let result = service.apply_payment(&PaymentRequest::new("abc", Some(amount("25")?)), service.deadline()).await;

    assert!(matches!(
        result,
        Err(LoanError::AmountMismatch { expected, received, .. }) if expected == Amount::from(dec!(23)) && received == Amount::from(dec!(25))
    ));
    assert!(storage.installments("abc").iter().all(|installment| installment.status == InstallmentStatus::Pending));

    Ok(())
}

#[tokio::test]
async fn test_service_rejects_payment_without_pending_installments() -> Result<()> {
    let storage = seeded_storage("abc", &[
        (InstallmentStatus::Paid, "10"),
        (InstallmentStatus::Closed, "13")
    ])?;
    let service = LoanService::new(storage);

    let result = service.apply_payment(&PaymentRequest::new("abc", Some(amount("25")?)), service.deadline()).await;

    assert!(matches!(result, Err(LoanError::NoPendingOutstanding { .. })));

    Ok(())
}

#[tokio::test]
async fn test_service_rejects_missing_zero_and_negative_amounts() -> Result<()> {
    let storage = seeded_storage("abc", &[(InstallmentStatus::Pending, "10")])?;
    let service = LoanService::new(storage);

    let missing = PaymentRequest { user_id: "abc".to_string(), amount: None };

    assert!(matches!(service.apply_payment(&missing, service.deadline()).await, Err(LoanError::Validation { .. })));
    assert!(matches!(service.apply_payment(&PaymentRequest::new("abc", Some(amount("0")?)), service.deadline()).await, Err(LoanError::Validation { .. })));
    assert!(matches!(service.apply_payment(&PaymentRequest::new("abc", Some(amount("-10")?)), service.deadline()).await, Err(LoanError::Validation { .. })));

    Ok(())
}

#[tokio::test]
async fn test_service_marks_closed_borrower_as_settled_after_payment() -> Result<()> {
    let storage = seeded_storage("abc", &[
        (InstallmentStatus::Closed, "10"),
        (InstallmentStatus::Pending, "13"),
        (InstallmentStatus::Pending, "5")
    ])?;
    let service = LoanService::new(storage);

    let before = service.compute_outstanding("abc", service.deadline()).await?;
    service.apply_payment(&PaymentRequest::new("abc", Some(amount("18")?)), service.deadline()).await?;
    let after = service.compute_outstanding("abc", service.deadline()).await?;

    assert_eq!(before.remaining_outstanding, Amount::from(dec!(18)));
    assert!(!before.is_delinquent);
    assert_eq!(after.remaining_outstanding, Amount::zero());
    assert!(!after.is_delinquent);

    Ok(())
}

#[tokio::test]
async fn test_service_surfaces_store_failures_as_store_errors() {
    let service = LoanService::new(Arc::new(FaultyStore { fault: Fault::Fail }));

    let outstanding = service.compute_outstanding("abc", service.deadline()).await;
    let payment = service.apply_payment(&PaymentRequest::new("abc", Some(Amount::from(dec!(25)))), service.deadline()).await;

    assert!(matches!(outstanding, Err(LoanError::Store(StoreError::Unavailable(_)))));
    assert!(matches!(payment, Err(LoanError::Store(StoreError::Unavailable(_)))));
}

#[tokio::test]
async fn test_service_aborts_when_store_misses_the_deadline() {
    let service = LoanService::new(Arc::new(FaultyStore { fault: Fault::Stall }))
        .with_timeout(Duration::from_millis(50));

    let outstanding = service.compute_outstanding("abc", service.deadline()).await;
    let payment = service.apply_payment(&PaymentRequest::new("abc", Some(Amount::from(dec!(25)))), service.deadline()).await;

    assert!(matches!(outstanding, Err(LoanError::Store(StoreError::Timeout { .. }))));
    assert!(matches!(payment, Err(LoanError::Store(StoreError::Timeout { .. }))));
}

#[tokio::test]
async fn test_service_honours_caller_deadline_over_default_timeout() {
    let service = LoanService::new(Arc::new(FaultyStore { fault: Fault::Stall }));
    let deadline = Instant::now() + Duration::from_millis(50);

    let outstanding = service.compute_outstanding("abc", deadline).await;
    let payment = service.apply_payment(&PaymentRequest::new("abc", Some(Amount::from(dec!(25)))), deadline).await;

    assert!(matches!(outstanding, Err(LoanError::Store(StoreError::Timeout { after })) if after <= Duration::from_millis(50)));
    assert!(matches!(payment, Err(LoanError::Store(StoreError::Timeout { .. }))));
}

#[tokio::test]
async fn test_service_contains_panics_as_store_faults() {
    let service = LoanService::new(Arc::new(FaultyStore { fault: Fault::Panic }));

    let outstanding = service.compute_outstanding("abc", service.deadline()).await;
    let payment = service.apply_payment(&PaymentRequest::new("abc", Some(Amount::from(dec!(25)))), service.deadline()).await;

    assert!(matches!(&outstanding, Err(LoanError::Store(StoreError::Fault(message))) if message == "classification defect"));
    assert!(matches!(payment, Err(LoanError::Store(StoreError::Fault(_)))));
}

#[tokio::test]
async fn test_service_reports_failed_status_update() -> Result<()> {
    let storage = seeded_storage("abc", &[
        (InstallmentStatus::Pending, "20"),
        (InstallmentStatus::Pending, "5")
    ])?;
    let service = LoanService::new(Arc::new(ReadOnlyStore { inner: storage.clone() }));

    let result = service.apply_payment(&PaymentRequest::new("abc", Some(amount("25")?)), service.deadline()).await;

    assert_eq!(result.map_err(|error| error.kind()), Err(ErrorKind::Store));
    assert!(storage.installments("abc").iter().all(|installment| installment.status == InstallmentStatus::Pending));

    Ok(())
}

fn create_temporary_csv(header: &str, rows: &[&str]) -> Result<NamedTempFile> {
    use std::io::Write;

    let mut file = NamedTempFile::new()?;

    writeln!(file, "{header}")?;

    for row in rows {
        writeln!(file, "{row}")?;
    }

    Ok(file)
}

#[tokio::test]
async fn test_engine_answers_requests_in_input_order() -> Result<()> {
    let storage = seeded_storage("abc", &[
        (InstallmentStatus::Pending, "20"),
        (InstallmentStatus::Pending, "5")
    ])?;
    let engine = ReconciliationEngine::new(Arc::new(LoanService::new(storage)));

    let file = create_temporary_csv("type,user_id,amount", &[
        "outstanding,abc,",
        "payment,abc,24",
        "payment,abc,25",
        "outstanding,abc,",
        "outstanding,xyz,",
        "payment,,25"
    ])?;

    let outcomes = engine.run(file.path().to_str().unwrap()).await?;
    let codes: Vec<_> = outcomes.iter().map(|outcome| outcome.code).collect();

    assert_eq!(codes, vec![
        ErrorKind::SUCCESS_CODE,
        ErrorKind::AmountMismatch.code(),
        ErrorKind::SUCCESS_CODE,
        ErrorKind::NotFound.code(),
        ErrorKind::NotFound.code(),
        ErrorKind::Validation.code()
    ]);

    assert_eq!(outcomes[0].kind, RequestKind::Outstanding);
    assert_eq!(outcomes[0].verdict.map(|verdict| verdict.remaining_outstanding), Some(Amount::from(dec!(25))));
    assert!(outcomes[2].verdict.is_none());

    Ok(())
}

#[tokio::test]
async fn test_engine_gracefully_skips_malformed_rows() -> Result<()> {
    let storage = seeded_storage("abc", &[(InstallmentStatus::Pending, "10")])?;
    let engine = ReconciliationEngine::new(Arc::new(LoanService::new(storage)));

    let file = create_temporary_csv("type,user_id,amount", &[
        "outstanding,abc,",
        "refund,abc,10",
        "payment,abc,ten",
        "payment,abc,10"
    ])?;

    let outcomes = engine.run(file.path().to_str().unwrap()).await?;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|outcome| outcome.code == ErrorKind::SUCCESS_CODE));

    Ok(())
}

#[tokio::test]
async fn test_engine_handles_missing_csv_file_without_error() -> Result<()> {
    let engine = ReconciliationEngine::new(Arc::new(LoanService::new(Arc::new(InstallmentStorage::new()))));

    let outcomes = engine.run("missing.csv").await?;

    assert!(outcomes.is_empty());

    Ok(())
}
