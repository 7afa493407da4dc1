//! Process command - extract a single receipt.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use cupom_core::export;
use cupom_core::{ChromiumLauncher, ExtractionOrchestrator, Interrupt, ReceiptRecord};

use super::config::load_config;
use crate::prompt::ConsolePrompt;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// 44-digit access key, or path to a QR code image
    #[arg(required = true)]
    entry: String,

    /// Do not write the CSV file
    #[arg(long)]
    no_save: bool,

    /// File name for the CSV (".csv" is appended when missing)
    #[arg(short, long)]
    name: Option<String>,

    /// Directory receiving the CSV file
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Also write the formatted record to this file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Format of the printed record
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per item
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(
    args: ProcessArgs,
    config_path: Option<&str>,
    interrupt: Interrupt,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(dir) = &args.output_dir {
        config.export.output_dir = dir.clone();
    }
    let delimiter = config.export.delimiter;

    info!("Processing entry: {}", args.entry);

    let orchestrator =
        ExtractionOrchestrator::new(config, ChromiumLauncher::new(), ConsolePrompt::new())
            .with_interrupt(interrupt);

    let outcome = orchestrator
        .process(&args.entry, !args.no_save, args.name.as_deref())
        .await;

    let Some(record) = outcome.record() else {
        anyhow::bail!("{}", outcome.message());
    };

    let output = format_record(record, args.format, delimiter)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    let mark = if outcome.save_failed() {
        style("!").yellow()
    } else {
        style("✓").green()
    };
    println!("{} {}", mark, outcome.message());
    Ok(())
}

/// Render a record in the requested format.
pub fn format_record(
    record: &ReceiptRecord,
    format: OutputFormat,
    delimiter: char,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => Ok(export::to_csv_string(record, delimiter)?),
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_text(record: &ReceiptRecord) -> String {
    let overview = record.overview();
    let mut output = record.to_string();

    output.push('\n');
    output.push_str(&format!(
        "{} items, total {}",
        overview.item_count,
        overview.total.as_deref().unwrap_or(export::SENTINEL)
    ));
    if overview.has_buyer {
        output.push_str(", buyer identified");
    }
    if overview.has_delivery {
        output.push_str(", with delivery");
    }

    output
}

