//! CLI application for CF-e SAT receipt extraction.

mod commands;
mod prompt;

use clap::{Parser, Subcommand};
use console::style;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cupom_core::Interrupt;

use commands::{batch, config, menu, process, validate};

/// Exit status after Ctrl-C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cupom SAT - Extract structured data from CF-e SAT receipts
#[derive(Parser)]
#[command(name = "cupom")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a single receipt from an access key or QR code image
    Process(process::ProcessArgs),

    /// Extract several receipts, one after another
    Batch(batch::BatchArgs),

    /// Check an access key or QR code image without querying the portal
    Validate(validate::ValidateArgs),

    /// Manage configuration
    Config(config::ConfigArgs),

    /// Interactive menu (default)
    Menu,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let interrupt = Interrupt::new();
    let config_path = cli.config.as_deref();

    let result = match cli.command.unwrap_or(Commands::Menu) {
        Commands::Process(args) => {
            watch_ctrl_c(&interrupt);
            process::run(args, config_path, interrupt.clone()).await
        }
        Commands::Batch(args) => {
            watch_ctrl_c(&interrupt);
            batch::run(args, config_path, interrupt.clone()).await
        }
        Commands::Validate(args) => validate::run(args).await,
        Commands::Config(args) => config::run(args, config_path).await,
        Commands::Menu => {
            watch_ctrl_c(&interrupt);
            menu::run(config_path, interrupt.clone()).await
        }
    };

    // A pending console read would keep the runtime alive
    if interrupt.is_raised() {
        eprintln!("{} Interrupted", style("✗").red());
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }

    result
}

fn watch_ctrl_c(interrupt: &Interrupt) {
    let interrupt = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.raise();
        }
    });
}
