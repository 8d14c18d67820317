mod actors;
mod engine;
mod models;
mod storage;
mod types;

use std::fs::File;
use std::io::{stderr, stdout, BufReader, BufWriter};
use std::process::exit;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use csv::Writer;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use crate::engine::{LoanService, ReconciliationEngine, DEFAULT_TIMEOUT};
use crate::models::Outcome;
use crate::storage::InstallmentStorage;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: loan-reconciler [installments].csv [requests].csv [log_level:optional] [timeout_ms:optional] > [results].csv");
        eprintln!("Available log levels: error, warn, info, debug, trace (default: error)");
        exit(1);
    }

    let installments_path = &args[1];
    let requests_path = &args[2];
    let log_level = args.get(3)
        .map(|s| parse_log_level(s)).unwrap_or_else(|| LevelFilter::ERROR);
    let timeout = args.get(4)
        .map(|s| parse_timeout(s)).unwrap_or(DEFAULT_TIMEOUT);

    setup_logging(log_level);

    let storage = Arc::new(InstallmentStorage::new());
    let file = File::open(installments_path)
        .with_context(|| format!("could not open installments at {installments_path}"))?;
    let imported = storage.import_csv(BufReader::new(file))
        .with_context(|| format!("could not import installments from {installments_path}"))?;

    info!("Imported {imported} installments");

    let service = Arc::new(LoanService::new(storage).with_timeout(timeout));
    let engine = ReconciliationEngine::new(service);

    let timer = Instant::now();
    let outcomes = engine.run(requests_path).await?;
    let duration = timer.elapsed();

    info!("Processed {} requests in: {duration:?}", outcomes.len());

    write_results_to_stdout(&outcomes)?;

    Ok(())
}

fn parse_log_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'error'", level);
            LevelFilter::ERROR
        }
    }
}

fn parse_timeout(value: &str) -> Duration {
    match value.parse::<u64>() {
        Ok(millis) if millis > 0 => Duration::from_millis(millis),
        _ => {
            eprintln!("Invalid timeout '{}', defaulting to {:?}", value, DEFAULT_TIMEOUT);
            DEFAULT_TIMEOUT
        }
    }
}

fn setup_logging(level: LevelFilter) {
    //NOTE: stdout carries the results, so logging goes to stderr
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry()
        .with(terminal_log)
        .init();
}

fn write_results_to_stdout(outcomes: &[Outcome]) -> Result<()> {
    let mut output = Writer::from_writer(BufWriter::new(stdout().lock()));

    output.write_record(["type", "user_id", "rc", "remaining_outstanding", "is_delinquent"])?;

    for outcome in outcomes {
        let (remaining, delinquent) = match &outcome.verdict {
            Some(verdict) => (verdict.remaining_outstanding.to_string(), verdict.is_delinquent.to_string()),
            None => (String::new(), String::new())
        };

        output.write_record([
            outcome.kind.to_string(),
            outcome.user_id.clone(),
            outcome.code.to_string(),
            remaining,
            delinquent
        ])?;
    }

    output.flush()?;

    Ok(())
}
