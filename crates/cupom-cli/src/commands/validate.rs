//! Validate command - resolve an entry without opening the portal.

use clap::Args;
use console::style;

use cupom_core::AccessKeyResolver;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// 44-digit access key, or path to a QR code image
    #[arg(required = true)]
    entry: String,
}

pub async fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let resolver = AccessKeyResolver::new();

    match resolver.dispatch(&args.entry) {
        Ok(key) => {
            println!("{} Valid access key: {}", style("✓").green(), style(&key).cyan());
            Ok(())
        }
        Err(e) => anyhow::bail!("Invalid entry: {}", e),
    }
}
