//! Credkit Demo CLI
//!
//! Command-line interface for exercising the credential rotation engine
//! against file storage and a simulated billing wallet.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod ui;
mod wallet;

#[derive(Parser)]
#[command(name = "credkit-demo")]
#[command(about = "Credkit Demo CLI - rotate quota-gated access credentials", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom storage directory
    #[arg(long, global = true)]
    storage_dir: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Onboard an account to a channel, issuing its first credential
    Onboard {
        /// Account identifier
        account: String,

        /// Channel to onboard (e.g. "atlas", "ceres")
        #[arg(short, long)]
        channel: String,
    },

    /// Show credential status
    Status {
        /// Account identifier
        account: String,

        /// Limit to one channel (default: all onboarded channels)
        #[arg(short, long)]
        channel: Option<String>,
    },

    /// Rotate the credential for a channel
    Rotate {
        /// Account identifier
        account: String,

        /// Channel whose credential to rotate
        #[arg(short, long)]
        channel: String,

        /// Request id for retry-safe invocation (generated when omitted;
        /// reuse it to resolve an unknown payment outcome)
        #[arg(long)]
        request_id: Option<String>,

        /// Skip the confirmation prompt for paid actions
        #[arg(short, long)]
        yes: bool,
    },

    /// Recover a locked-out credential (paid)
    Recover {
        /// Account identifier
        account: String,

        /// Channel whose credential to recover
        #[arg(short, long)]
        channel: String,

        /// Request id for retry-safe invocation (generated when omitted)
        #[arg(long)]
        request_id: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage the simulated billing wallet
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
}

#[derive(Subcommand)]
enum WalletAction {
    /// Show the wallet balance
    Show,

    /// Add funds to the wallet
    Topup {
        /// Amount in minor units
        amount: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("credkit_demo_cli=debug,credkit_rotations=debug,credkit_lib=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("credkit_demo_cli=info,credkit_rotations=warn")
            .init();
    }

    // Setup storage directory
    let storage_dir = if let Some(dir) = cli.storage_dir {
        std::path::PathBuf::from(dir)
    } else {
        dirs::data_local_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("credkit-demo")
    };

    // Dispatch commands
    match cli.command {
        Commands::Onboard { account, channel } => {
            commands::onboard::run(&storage_dir, &account, &channel, cli.verbose).await?;
        }
        Commands::Status { account, channel } => {
            commands::status::run(&storage_dir, &account, channel, cli.verbose).await?;
        }
        Commands::Rotate {
            account,
            channel,
            request_id,
            yes,
        } => {
            commands::rotate::run(&storage_dir, &account, &channel, request_id, yes, cli.verbose)
                .await?;
        }
        Commands::Recover {
            account,
            channel,
            request_id,
            yes,
        } => {
            commands::recover::run(&storage_dir, &account, &channel, request_id, yes, cli.verbose)
                .await?;
        }
        Commands::Wallet { action } => match action {
            WalletAction::Show => {
                commands::wallet::show(&storage_dir, cli.verbose).await?;
            }
            WalletAction::Topup { amount } => {
                commands::wallet::topup(&storage_dir, &amount, cli.verbose).await?;
            }
        },
    }

    Ok(())
}
