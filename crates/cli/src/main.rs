mod cli;
mod config;

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use lrfmp_compute::SegmentationPipeline;
use lrfmp_ingest::LedgerImporter;

use crate::cli::CliArgs;

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    lrfmp_core::config::load_dotenv();
    let args = CliArgs::parse();

    let mut config = config::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply_overrides(&mut config.clustering);
    config.log_summary();

    let (events, stats) = LedgerImporter::import(&args.input, &config.ledger)
        .with_context(|| format!("failed to import ledger: {}", args.input.display()))?;
    info!(
        rows = stats.rows_read,
        approved = stats.approved,
        skipped = stats.skipped_status,
        "ledger loaded"
    );

    let report = SegmentationPipeline::new(config.clustering)
        .run(&events, None)
        .context("segmentation failed")?;

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output: {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &report)?;
            writer.flush()?;
            info!(output = %path.display(), "report written");
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &report)?;
            writeln!(writer)?;
        }
    }

    Ok(())
}
