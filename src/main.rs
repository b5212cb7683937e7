// src/main.rs
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use article_extractor::batch::{group_inputs, run_batch};
use article_extractor::config::Config;
use article_extractor::storage::StorageManager;
use article_extractor::utils::{self, AppError};

/// Command Line Interface for the article structure extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON extraction config (rule name -> defined-by patterns and data)
    #[arg(short, long)]
    config: PathBuf,

    /// Article files (HTML or XML). `<stem>_table_<n>.<ext>` files are
    /// attached to the article `<stem>.<ext>` in the same directory.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for extracted content
    #[arg(short, long, default_value = "./output")]
    output_dir: String,

    /// Number of document groups processed concurrently (default: CPU count)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Debug mode - also write failure info for groups that could not be extracted
    #[arg(short, long)]
    debug: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments and setup logging (reads RUST_LOG env var)
    let args = Args::parse();
    utils::logging::setup_logging(args.verbose);
    tracing::info!("Starting processing for args: {:?}", args);

    // 2. Load the extraction config; a bad config stops the run
    let config = Arc::new(Config::from_path(&args.config)?);

    // 3. Initialize storage
    let storage = StorageManager::new(&args.output_dir)?;

    // 4. Group inputs into articles
    let groups = group_inputs(&args.inputs);
    tracing::info!("Found {} document groups in {} input files", groups.len(), args.inputs.len());

    if groups.is_empty() {
        return Err(AppError::Processing("No usable input files".to_string()));
    }

    let jobs = args
        .jobs
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()));
    let date = chrono::Local::now().format("%Y%m%d").to_string();

    // 5. Process every group
    let outcomes = run_batch(config, groups, jobs).await;

    let mut success_count = 0;
    let mut failure_count = 0;

    for outcome in outcomes {
        match outcome.result {
            Ok(doc) => match storage.save_document(&doc, &date) {
                Ok(paths) => {
                    success_count += 1;
                    tracing::info!(
                        "Extracted {}: {} sections, {} tables, {} abbreviations, {} diagnostics ({} files)",
                        doc.id,
                        doc.sections.len(),
                        doc.tables.len(),
                        doc.abbreviations.entries.len(),
                        doc.diagnostics.len(),
                        paths.len()
                    );
                }
                Err(e) => {
                    tracing::error!("Failed to save outputs for {}: {}", doc.id, e);
                    failure_count += 1;
                }
            },
            Err(e) => {
                tracing::error!("Failed to extract {}: {}", outcome.group.id, e);
                failure_count += 1;

                if args.debug {
                    if let Err(e) = storage.save_failure(&outcome.group.id, &e.to_string()) {
                        tracing::error!("Failed to save failure info: {}", e);
                    }
                }
            }
        }
    }

    tracing::info!("Processing finished. Success: {}, Failures: {}", success_count, failure_count);

    if success_count == 0 && failure_count > 0 {
        return Err(AppError::Processing(format!(
            "Failed to extract any of {} document groups",
            failure_count
        )));
    }

    Ok(())
}
