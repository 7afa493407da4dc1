//! Console input and the operator prompt for the manual challenge.

use std::io::{self, Write};

use async_trait::async_trait;
use console::style;
use indicatif::ProgressBar;

use cupom_core::{AccessKey, ChallengeSignal, Interrupt};

/// Read one trimmed line from stdin. `None` on end of input.
pub async fn read_line() -> io::Result<Option<String>> {
    tokio::task::spawn_blocking(|| -> io::Result<Option<String>> {
        let mut line = String::new();
        let read = io::stdin().read_line(&mut line)?;
        Ok((read > 0).then(|| line.trim().to_string()))
    })
    .await
    .map_err(io::Error::other)?
}

/// Print `question` and read the answer. `None` on end of input or interrupt.
pub async fn ask(question: &str, interrupt: &Interrupt) -> io::Result<Option<String>> {
    print!("{} ", question);
    io::stdout().flush()?;

    tokio::select! {
        line = read_line() => line,
        _ = interrupt.raised() => Ok(None),
    }
}

/// Read a yes/no answer; an empty answer takes `default`.
pub fn parse_yes_no(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" | "s" | "sim" => Some(true),
        "n" | "no" | "nao" | "não" => Some(false),
        _ => None,
    }
}

/// Ask until the answer is yes or no. `None` on end of input or interrupt.
pub async fn confirm(
    question: &str,
    default: bool,
    interrupt: &Interrupt,
) -> io::Result<Option<bool>> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let question = format!("{} {}", question, hint);

    loop {
        let Some(answer) = ask(&question, interrupt).await? else {
            return Ok(None);
        };
        match parse_yes_no(&answer, default) {
            Some(choice) => return Ok(Some(choice)),
            None => println!("Please answer y or n."),
        }
    }
}

/// Asks the operator to solve the challenge in the browser window.
#[derive(Clone, Default)]
pub struct ConsolePrompt {
    progress: Option<ProgressBar>,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide `progress` while the instructions are printed.
    pub fn with_progress(progress: ProgressBar) -> Self {
        Self {
            progress: Some(progress),
        }
    }

    fn print_instructions(key: &AccessKey) {
        println!();
        println!("{}", style("Manual step required").yellow().bold());
        println!("  Access key: {}", style(key).cyan());
        println!("  1. Solve the verification challenge in the browser window");
        println!("  2. Do not press \"Consultar\", it is submitted for you");
        println!(
            "  3. Press {} here to continue, or type {} to skip this receipt",
            style("ENTER").bold(),
            style("q").bold()
        );
    }
}

#[async_trait]
impl ChallengeSignal for ConsolePrompt {
    async fn wait_for_confirmation(&self, key: &AccessKey) -> Result<(), String> {
        match &self.progress {
            Some(progress) => progress.suspend(|| Self::print_instructions(key)),
            None => Self::print_instructions(key),
        }

        match read_line().await {
            Ok(Some(answer)) if answer.eq_ignore_ascii_case("q") => {
                Err("skipped by the operator".to_string())
            }
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err("standard input closed".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}
