use clap::Parser;
use loan_engine::application::engine::LoanLifecycleEngine;
use loan_engine::config::Config;
use loan_engine::domain::ports::{LoanStoreBox, NotifierBox};
use loan_engine::error::LoanError;
use loan_engine::infrastructure::in_memory::InMemoryLoanStore;
use loan_engine::infrastructure::notifier::{HttpNotifier, LogNotifier};
#[cfg(feature = "storage-rocksdb")]
use loan_engine::infrastructure::rocksdb::RocksDbLoanStore;
use loan_engine::interfaces::csv::loan_writer::LoanWriter;
use loan_engine::interfaces::json::command_reader::CommandReader;
use loan_engine::telemetry;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input loan commands, one JSON object per line
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().into_diagnostic()?;
    telemetry::init(&config.log_level);

    let store = open_store(cli.db_path)?;
    let notifier: NotifierBox = match (&config.notification_base_url, &config.notification_api_key) {
        (Some(base_url), Some(api_key)) => Box::new(
            HttpNotifier::new(base_url.as_str(), api_key.as_str(), config.notification_timeout)
                .into_diagnostic()?,
        ),
        _ => Box::new(LogNotifier),
    };

    let engine = LoanLifecycleEngine::new(store, notifier).with_config(config.engine_config());

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                let outcome = tokio::time::timeout(config.operation_timeout, engine.execute(command))
                    .await
                    .unwrap_or(Err(LoanError::Timeout(config.operation_timeout)));
                if let Err(e) = outcome {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    let loans = engine.loans().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = LoanWriter::new(stdout.lock());
    writer.write_loans(&loans).into_diagnostic()?;

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<LoanStoreBox> {
    match db_path {
        Some(path) => Ok(Box::new(RocksDbLoanStore::open(path).into_diagnostic()?)),
        None => Ok(Box::new(InMemoryLoanStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<LoanStoreBox> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Box::new(InMemoryLoanStore::new()))
}
