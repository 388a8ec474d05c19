//! CLI command implementations

use anyhow::{Context, Result};
use dialoguer::Confirm;
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::balance::{AssetId, BalanceSnapshot, RpcBalanceSource, SyncCoordinator, SyncTrigger};
use crate::config::Config;
use crate::router::{ExecutionRouter, TradeIntent, VenueRegistry, VenueSelection};
use crate::trading::{
    relay_from_config, Amount, BatchOutcome, HttpTemplateBuilder, OperationSpec, SigningPipeline,
    WalletOutcome,
};
use crate::wallet::{Wallet, WalletStore};

/// Everything one command needs: wallets, balances and the pipeline
struct Session {
    store: WalletStore,
    coordinator: SyncCoordinator,
    pipeline: Arc<SigningPipeline>,
}

impl Session {
    fn open(config: &Config) -> Result<Self> {
        let store = WalletStore::load(Path::new(&config.wallet.registry_path))
            .context("Failed to load wallet registry")?;

        let source = Arc::new(RpcBalanceSource::new(&config.rpc));
        let coordinator = SyncCoordinator::from_config(source, &config.sync);

        let builder = Arc::new(HttpTemplateBuilder::new(&config.builder)?);
        let relay: Arc<dyn crate::trading::Relay> = Arc::from(relay_from_config(&config.relay)?);
        let pipeline = Arc::new(SigningPipeline::new(builder, relay));

        Ok(Self {
            store,
            coordinator,
            pipeline,
        })
    }

    fn router(&self, config: &Config) -> Result<ExecutionRouter> {
        let registry =
            VenueRegistry::from_config(&config.venues, &config.trading, self.pipeline.clone())?;
        Ok(ExecutionRouter::new(registry, config.trading.fee_reserve_sol))
    }

    /// Sync if the wallet list or asset changed since the last check
    async fn sync_if_changed(&self, asset: Option<&AssetId>) -> Result<Arc<BalanceSnapshot>> {
        match self.coordinator.detect_trigger(self.store.len(), asset) {
            Some(trigger) => self.sync(asset, trigger).await,
            None => Ok(self.coordinator.snapshot().await),
        }
    }

    async fn sync(&self, asset: Option<&AssetId>, trigger: SyncTrigger) -> Result<Arc<BalanceSnapshot>> {
        let snapshot = self
            .coordinator
            .refresh(&self.store.addresses(), asset, trigger)
            .await?;
        Ok(snapshot)
    }

    /// Re-sync after an operation that landed at least one transaction
    async fn resync_after(&self, batch: &BatchOutcome, asset: Option<&AssetId>) {
        if !batch.any_succeeded() {
            return;
        }
        match self.sync(asset, SyncTrigger::OperationCompleted).await {
            Ok(snapshot) => println!("{}", updated_totals(&snapshot)),
            Err(e) => warn!("Post-operation balance refresh failed: {}", e),
        }
    }

    fn label(&self, address: &str) -> String {
        match self.store.get(address) {
            Some(w) => format!("{} ({})", w.name, w.short_address()),
            None => address.to_string(),
        }
    }
}

fn updated_totals(snapshot: &BalanceSnapshot) -> String {
    let mut line = format!("Updated total: {:.4} SOL", snapshot.total_native());
    if let Some(asset) = &snapshot.asset_ref {
        line.push_str(&format!(", {}: {}", asset, snapshot.total_asset()));
    }
    line
}

fn parse_asset(asset: Option<&str>) -> Option<AssetId> {
    asset.and_then(AssetId::parse)
}

fn parse_address(address: &str) -> Result<Pubkey> {
    address
        .parse::<Pubkey>()
        .map_err(|e| anyhow::anyhow!("Invalid address {}: {}", address, e))
}

/// Accepts "50", "50%" and "100%"
fn parse_percent(input: &str) -> Result<f64> {
    input
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid percentage '{}': {}", input, e))
}

fn confirm(config: &Config, force: bool, prompt: String) -> Result<bool> {
    if !config.safety.require_confirmation || force {
        return Ok(true);
    }
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    if !confirmed {
        info!("Cancelled by user");
    }
    Ok(confirmed)
}

fn print_batch(session: &Session, batch: &BatchOutcome) {
    println!();
    for WalletOutcome { address, outcome } in &batch.outcomes {
        match outcome.signature() {
            Some(signature) => {
                println!("  {} OK {}", session.label(address), signature);
                println!("    https://solscan.io/tx/{}", signature);
            }
            None => println!("  {} {}", session.label(address), outcome),
        }
    }
    println!("\n{}", batch.summary());
}

/// Show fleet balances
pub async fn balances(config: &Config, asset: Option<&str>) -> Result<()> {
    let session = Session::open(config)?;
    let asset = parse_asset(asset);

    if session.store.is_empty() {
        println!("No wallets in {}", config.wallet.registry_path);
        return Ok(());
    }

    let snapshot = session.sync(asset.as_ref(), SyncTrigger::Manual).await?;

    println!("\n=== FLEET BALANCES ===\n");
    for wallet in session.store.wallets() {
        let status = if wallet.active { "" } else { " [inactive]" };
        print!(
            "{:<16} {}  {:>12} SOL",
            wallet.name,
            wallet.address(),
            snapshot.native_state(wallet.address()).to_string()
        );
        if asset.is_some() {
            print!("  {:>16}", snapshot.asset_state(wallet.address()).to_string());
        }
        println!("{}", status);
    }

    println!("\nTotal: {:.4} SOL", snapshot.total_native());
    if let Some(asset) = &asset {
        println!("Total {}: {}", asset, snapshot.total_asset());
    }
    let unknown = snapshot.unknown_native();
    if unknown > 0 {
        println!("{} wallet(s) could not be queried", unknown);
    }

    Ok(())
}

/// Buy a token from every selected wallet
pub async fn buy(
    config: &Config,
    token: &str,
    amount_sol: f64,
    venue: Option<String>,
    wallets: Vec<String>,
) -> Result<()> {
    info!("Buy command: token={}, amount={} SOL per wallet", token, amount_sol);

    let session = Session::open(config)?;
    let router = session.router(config)?;
    let snapshot = session.sync_if_changed(None).await?;

    let wallets = if wallets.is_empty() {
        session.store.addresses()
    } else {
        wallets
    };
    let intent = TradeIntent::buy(token, amount_sol, venue_selection(venue), wallets);

    let batch = router.submit(&intent, &session.store, &snapshot).await?;
    print_batch(&session, &batch);
    session.resync_after(&batch, None).await;

    Ok(())
}

/// Sell a percentage of a token from every selected wallet
pub async fn sell(
    config: &Config,
    token: &str,
    percent: &str,
    venue: Option<String>,
    wallets: Vec<String>,
    force: bool,
) -> Result<()> {
    info!("Sell command: token={}, amount={}", token, percent);
    let percent = parse_percent(percent)?;

    let session = Session::open(config)?;
    let router = session.router(config)?;
    let snapshot = session.sync_if_changed(None).await?;

    let wallets = if wallets.is_empty() {
        session.store.addresses()
    } else {
        wallets
    };
    let intent = TradeIntent::sell(token, percent, venue_selection(venue), wallets);

    // Validate before asking, so the prompt is never shown for a doomed sell
    let selected = router.validate(&intent, &session.store, &snapshot)?;
    if !confirm(
        config,
        force,
        format!(
            "Sell {}% of {} from {} wallet(s)? This cannot be undone.",
            percent,
            token,
            selected.len()
        ),
    )? {
        return Ok(());
    }

    let batch = router.submit(&intent, &session.store, &snapshot).await?;
    print_batch(&session, &batch);
    session.resync_after(&batch, None).await;

    Ok(())
}

fn venue_selection(venue: Option<String>) -> VenueSelection {
    match venue {
        Some(id) => VenueSelection::Explicit(id),
        None => VenueSelection::auto(),
    }
}

/// Transfer SOL or an asset from one wallet
pub async fn transfer(
    config: &Config,
    destination: &str,
    amount: &str,
    from: &str,
    asset: Option<&str>,
) -> Result<()> {
    parse_address(destination)?;
    let amount: Amount = amount.parse()?;
    let asset = parse_asset(asset);

    let session = Session::open(config)?;
    let wallet = session
        .store
        .get(from)
        .ok_or_else(|| anyhow::anyhow!("Wallet not found: {}", from))?;

    let op = OperationSpec::Transfer {
        destination: destination.to_string(),
        asset: asset.clone(),
        amount,
    };
    info!("{} from {}", op, wallet.short_address());

    let batch = session.pipeline.execute(&op, &[wallet]).await;
    print_batch(&session, &batch);
    session.resync_after(&batch, asset.as_ref()).await;

    Ok(())
}

/// Sweep SOL or an asset from every active wallet into `destination`
pub async fn consolidate(
    config: &Config,
    destination: &str,
    asset: Option<&str>,
    force: bool,
) -> Result<()> {
    parse_address(destination)?;
    let asset = parse_asset(asset);

    let session = Session::open(config)?;
    let sources: Vec<&Wallet> = session
        .store
        .active_wallets()
        .into_iter()
        .filter(|w| w.address() != destination)
        .collect();

    if sources.is_empty() {
        println!("No active wallets to consolidate from");
        return Ok(());
    }

    let what = asset.as_ref().map(|a| a.as_str()).unwrap_or("SOL");
    if !confirm(
        config,
        force,
        format!(
            "Move all {} from {} wallet(s) to {}?",
            what,
            sources.len(),
            destination
        ),
    )? {
        return Ok(());
    }

    let op = OperationSpec::Consolidate {
        destination: destination.to_string(),
        asset: asset.clone(),
    };
    let batch = session.pipeline.execute(&op, &sources).await;
    print_batch(&session, &batch);
    session.resync_after(&batch, asset.as_ref()).await;

    Ok(())
}

/// Burn an asset held by the selected wallets
pub async fn burn(
    config: &Config,
    asset: &str,
    amount: &str,
    wallets: Vec<String>,
    force: bool,
) -> Result<()> {
    let asset_id =
        AssetId::parse(asset).ok_or_else(|| anyhow::anyhow!("Asset mint is required"))?;
    let amount: Amount = amount.parse()?;

    let session = Session::open(config)?;
    let sources: Vec<&Wallet> = if wallets.is_empty() {
        session.store.active_wallets()
    } else {
        session.store.resolve(&wallets)?
    };

    if sources.is_empty() {
        println!("No wallets selected");
        return Ok(());
    }

    if !confirm(
        config,
        force,
        format!(
            "Burn {} of {} in {} wallet(s)? This cannot be undone.",
            amount,
            asset_id,
            sources.len()
        ),
    )? {
        return Ok(());
    }

    let op = OperationSpec::Burn {
        asset: asset_id.clone(),
        amount,
    };
    let batch = session.pipeline.execute(&op, &sources).await;
    print_batch(&session, &batch);
    session.resync_after(&batch, Some(&asset_id)).await;

    Ok(())
}

/// Show configuration
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check system health
pub async fn health(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    let mut all_healthy = true;

    // Check RPC
    print!("RPC Endpoint... ");
    match RpcBalanceSource::new(&config.rpc).ping().await {
        Ok(latency) => println!("OK ({}ms)", latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Transaction builder... ");
    match check_http(&config.builder.url, config.builder.timeout_ms).await {
        Ok(latency) => println!("OK ({}ms)", latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Relay ({})... ", config.relay.kind);
    match check_http(&config.relay.url, config.relay.timeout_ms).await {
        Ok(latency) => println!("OK ({}ms)", latency),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    print!("Wallet registry... ");
    match WalletStore::load(Path::new(&config.wallet.registry_path)) {
        Ok(store) if store.is_empty() => {
            println!("EMPTY ({})", config.wallet.registry_path);
            all_healthy = false;
        }
        Ok(store) => println!(
            "OK ({} wallets, {} active)",
            store.len(),
            store.active_wallets().len()
        ),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    println!();
    if all_healthy {
        println!("All systems healthy!");
    } else {
        println!("Some systems are unhealthy. Check the errors above.");
    }

    Ok(())
}

/// Any HTTP answer counts as reachable; only transport failures are errors
async fn check_http(url: &str, timeout_ms: u64) -> Result<u128> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()?;

    let start = Instant::now();
    match client.get(url).send().await {
        Ok(response) => {
            debug!("{} answered {}", url, response.status());
            Ok(start.elapsed().as_millis())
        }
        Err(e) => {
            error!("{} unreachable: {}", url, e);
            Err(anyhow::anyhow!("unreachable: {}", e))
        }
    }
}
