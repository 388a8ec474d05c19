//! Fleet Trader - multi-wallet Solana trading from the command line
//!
//! # WARNING
//! - This tool trades with real money across every active wallet at once.
//! - Submitted transactions are not retried; check the printed signatures
//!   before re-running a failed command.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

// Use the library crate
use fleet_trader::cli::commands;
use fleet_trader::config::Config;

/// Fleet Trader - multi-wallet balance sync and trade execution
#[derive(Parser)]
#[command(name = "fleet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "fleet.toml")]
    config: String,

    /// Emit logs as JSON
    #[arg(long, env = "FLEET_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh and show balances for every wallet
    Balances {
        /// Also show balances of this token mint
        #[arg(long)]
        asset: Option<String>,
    },

    /// Buy a token from the selected wallets
    Buy {
        /// Token mint address
        token: String,

        /// SOL to spend per wallet
        amount: f64,

        /// Venue id (default: recommended or configured default)
        #[arg(long)]
        venue: Option<String>,

        /// Wallet address to trade from (repeatable, default: all active)
        #[arg(long = "wallet")]
        wallets: Vec<String>,
    },

    /// Sell a token from the selected wallets
    Sell {
        /// Token mint address
        token: String,

        /// Percentage of each holding to sell, e.g. "50%"
        #[arg(default_value = "100%")]
        percent: String,

        /// Venue id (default: recommended or configured default)
        #[arg(long)]
        venue: Option<String>,

        /// Wallet address to trade from (repeatable, default: all active)
        #[arg(long = "wallet")]
        wallets: Vec<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Transfer SOL or a token from one wallet
    Transfer {
        /// Destination address
        destination: String,

        /// Amount, fixed ("0.5") or percentage ("50%")
        amount: String,

        /// Source wallet address
        #[arg(long)]
        from: String,

        /// Token mint (default: SOL)
        #[arg(long)]
        asset: Option<String>,
    },

    /// Sweep SOL or a token from every active wallet to one address
    Consolidate {
        /// Destination address
        destination: String,

        /// Token mint (default: SOL)
        #[arg(long)]
        asset: Option<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Burn a token held by the selected wallets
    Burn {
        /// Token mint address
        asset: String,

        /// Amount, fixed or percentage
        #[arg(default_value = "100%")]
        amount: String,

        /// Wallet address to burn from (repeatable, default: all active)
        #[arg(long = "wallet")]
        wallets: Vec<String>,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Check system health (RPC, builder, relay, wallets)
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("fleet_trader=info".parse()?);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    startup_checks(&config);

    // Execute command
    let result = match cli.command {
        Commands::Balances { asset } => commands::balances(&config, asset.as_deref()).await,
        Commands::Buy {
            token,
            amount,
            venue,
            wallets,
        } => commands::buy(&config, &token, amount, venue, wallets).await,
        Commands::Sell {
            token,
            percent,
            venue,
            wallets,
            force,
        } => commands::sell(&config, &token, &percent, venue, wallets, force).await,
        Commands::Transfer {
            destination,
            amount,
            from,
            asset,
        } => commands::transfer(&config, &destination, &amount, &from, asset.as_deref()).await,
        Commands::Consolidate {
            destination,
            asset,
            force,
        } => commands::consolidate(&config, &destination, asset.as_deref(), force).await,
        Commands::Burn {
            asset,
            amount,
            wallets,
            force,
        } => commands::burn(&config, &asset, &amount, wallets, force).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Warn about unsafe local setup
fn startup_checks(config: &Config) {
    // The registry may hold base58 secrets inline
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(&config.wallet.registry_path) {
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                warn!(
                    "Wallet registry {} has permissions {:o}; run 'chmod 600 {}'",
                    config.wallet.registry_path,
                    mode & 0o777,
                    config.wallet.registry_path
                );
            }
        }
    }

    if !config.safety.require_confirmation {
        warn!("Confirmation prompts are disabled");
    }

    info!(
        "Relay: {}, venues: {}",
        config.relay.kind,
        config.venues.list.len()
    );
}
