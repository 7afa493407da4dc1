//! Batch command - extract several receipts in sequence.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use cupom_core::{BatchReport, ChromiumLauncher, ExtractionOrchestrator, Interrupt};

use super::config::load_config;
use crate::prompt::ConsolePrompt;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Access keys, QR code images or glob patterns matching images
    entries: Vec<String>,

    /// Read entries from a text file, one per line ('#' starts a comment)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Directory receiving the CSV files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Do not write CSV files
    #[arg(long)]
    no_save: bool,

    /// Write the batch report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

pub async fn run(
    args: BatchArgs,
    config_path: Option<&str>,
    interrupt: Interrupt,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(dir) = &args.output_dir {
        config.export.output_dir = dir.clone();
    }

    let mut entries = expand_entries(&args.entries)?;
    if let Some(file) = &args.file {
        entries.extend(read_entry_file(file)?);
    }

    if entries.is_empty() {
        anyhow::bail!("No entries given. Pass access keys, image paths or --file.");
    }

    println!(
        "{} Found {} entries to process",
        style("ℹ").blue(),
        entries.len()
    );

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let orchestrator = ExtractionOrchestrator::new(
        config,
        ChromiumLauncher::new(),
        ConsolePrompt::with_progress(pb.clone()),
    )
    .with_interrupt(interrupt);

    let mut states = orchestrator.subscribe();
    let watcher = {
        let pb = pb.clone();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let state = *states.borrow_and_update();
                pb.set_message(state.description());
            }
        })
    };

    let report = orchestrator.process_batch(&entries, !args.no_save).await;

    watcher.abort();
    pb.finish_and_clear();

    print_report(&report);

    if let Some(report_path) = &args.report {
        fs::write(report_path, serde_json::to_string_pretty(&report)?)?;
        println!(
            "{} Report written to {}",
            style("✓").green(),
            report_path.display()
        );
    }

    debug!("Batch processing time: {:?}", start.elapsed());

    if report.succeeded == 0 {
        anyhow::bail!("No receipt was extracted");
    }

    Ok(())
}

fn has_glob_chars(entry: &str) -> bool {
    entry.contains(['*', '?', '['])
}

/// Expand glob patterns; other entries pass through unchanged.
fn expand_entries(entries: &[String]) -> anyhow::Result<Vec<String>> {
    let mut expanded = Vec::with_capacity(entries.len());

    for entry in entries {
        if !has_glob_chars(entry) {
            expanded.push(entry.clone());
            continue;
        }

        let before = expanded.len();
        for path in glob(entry)?.filter_map(|r| r.ok()) {
            if cupom_core::key::is_image_path(&path) {
                expanded.push(path.to_string_lossy().into_owned());
            }
        }

        if expanded.len() == before {
            warn!("No images match pattern: {}", entry);
        }
    }

    Ok(expanded)
}

pub fn read_entry_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;

    Ok(parse_entry_lines(&content))
}

fn parse_entry_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

pub fn print_report(report: &BatchReport) {
    println!();
    for entry in &report.entries {
        let mark = if entry.success {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("{} {} {}", mark, style(&entry.key).cyan(), entry.message);
    }

    println!();
    println!(
        "{} Processed {} entries: {} succeeded, {} failed",
        style("ℹ").blue(),
        report.total,
        style(report.succeeded).green(),
        style(report.failed).red()
    );

    if report.interrupted {
        println!("{} Batch interrupted before the last entry", style("!").yellow());
    }
}
