//! Interactive menu, shown when no subcommand is given.

use std::path::Path;

use console::style;

use cupom_core::{ChromiumLauncher, ExtractionOrchestrator, Interrupt};

use super::batch::{print_report, read_entry_file};
use super::config::load_config;
use crate::prompt::{ConsolePrompt, ask, confirm};

type Orchestrator = ExtractionOrchestrator<ChromiumLauncher, ConsolePrompt>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Single,
    Batch,
    Validate,
    Exit,
}

impl Choice {
    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Single),
            "2" => Some(Self::Batch),
            "3" => Some(Self::Validate),
            "4" | "q" => Some(Self::Exit),
            _ => None,
        }
    }
}

pub async fn run(config_path: Option<&str>, interrupt: Interrupt) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let orchestrator =
        ExtractionOrchestrator::new(config, ChromiumLauncher::new(), ConsolePrompt::new())
            .with_interrupt(interrupt.clone());

    loop {
        print_menu();

        let Some(answer) = ask("Choose an option [1-4]:", &interrupt).await? else {
            break;
        };

        match Choice::parse(&answer) {
            Some(Choice::Single) => single(&orchestrator, &interrupt).await?,
            Some(Choice::Batch) => batch(&orchestrator, &interrupt).await?,
            Some(Choice::Validate) => validate(&orchestrator, &interrupt).await?,
            Some(Choice::Exit) => break,
            None => println!("{} Unknown option: {}", style("✗").red(), answer),
        }

        if interrupt.is_raised() {
            break;
        }
    }

    Ok(())
}

fn print_menu() {
    println!();
    println!("{}", style("CF-e SAT receipt extraction").bold());
    println!("  1. Extract one receipt");
    println!("  2. Extract several receipts");
    println!("  3. Validate an access key or QR code image");
    println!("  4. Exit");
}

async fn single(orchestrator: &Orchestrator, interrupt: &Interrupt) -> anyhow::Result<()> {
    let Some(entry) = ask("Access key or QR image path:", interrupt).await? else {
        return Ok(());
    };
    if entry.is_empty() {
        return Ok(());
    }

    let Some(save) = confirm("Save the receipt as CSV?", true, interrupt).await? else {
        return Ok(());
    };
    let name = if save {
        ask("CSV file name (empty for automatic):", interrupt).await?
    } else {
        None
    };
    let name = name.as_deref().filter(|n| !n.is_empty());

    let outcome = orchestrator.process(&entry, save, name).await;

    if let Some(record) = outcome.record() {
        println!();
        print!("{}", record);
    }

    let mark = if outcome.save_failed() {
        style("!").yellow()
    } else if outcome.is_success() {
        style("✓").green()
    } else {
        style("✗").red()
    };
    println!("{} {}", mark, outcome.message());

    Ok(())
}

async fn batch(orchestrator: &Orchestrator, interrupt: &Interrupt) -> anyhow::Result<()> {
    println!("  1. Type the entries");
    println!("  2. Read them from a file");

    let Some(source) = ask("Source [1-2]:", interrupt).await? else {
        return Ok(());
    };

    let entries = match source.trim() {
        "1" => read_typed_entries(interrupt).await?,
        "2" => {
            let Some(path) = ask("File path:", interrupt).await? else {
                return Ok(());
            };
            match read_entry_file(Path::new(&path)) {
                Ok(entries) => entries,
                Err(e) => {
                    println!("{} {}", style("✗").red(), e);
                    return Ok(());
                }
            }
        }
        _ => {
            println!("{} Unknown option: {}", style("✗").red(), source);
            return Ok(());
        }
    };

    if entries.is_empty() {
        println!("{} No entries given", style("ℹ").blue());
        return Ok(());
    }

    let Some(save) = confirm("Save each receipt as CSV?", true, interrupt).await? else {
        return Ok(());
    };
    let question = format!("Process {} entries?", entries.len());
    if confirm(&question, true, interrupt).await? != Some(true) {
        println!("{} Batch cancelled", style("ℹ").blue());
        return Ok(());
    }

    let report = orchestrator.process_batch(&entries, save).await;
    print_report(&report);

    Ok(())
}

/// One entry per line until an empty line.
async fn read_typed_entries(interrupt: &Interrupt) -> anyhow::Result<Vec<String>> {
    println!("Enter one access key or image path per line, empty line to finish.");

    let mut entries = Vec::new();
    while let Some(line) = ask(">", interrupt).await? {
        if line.is_empty() {
            break;
        }
        entries.push(line);
    }

    Ok(entries)
}

async fn validate(orchestrator: &Orchestrator, interrupt: &Interrupt) -> anyhow::Result<()> {
    let Some(entry) = ask("Access key or QR image path:", interrupt).await? else {
        return Ok(());
    };

    match orchestrator.validate(&entry) {
        Ok(key) => println!("{} Valid access key: {}", style("✓").green(), style(&key).cyan()),
        Err(e) => println!("{} Invalid entry: {}", style("✗").red(), e),
    }

    Ok(())
}
