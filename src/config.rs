//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub venues: VenuesConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
}

/// Balance data source
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Transaction builder service
#[derive(Debug, Clone, Deserialize)]
pub struct BuilderConfig {
    #[serde(default = "default_builder_url")]
    pub url: String,
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            url: default_builder_url(),
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RelayKind {
    /// Jito block engine
    Jito,
    /// Plain Solana RPC
    Rpc,
}

impl std::fmt::Display for RelayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayKind::Jito => write!(f, "jito"),
            RelayKind::Rpc => write!(f, "rpc"),
        }
    }
}

/// Signed transaction relay
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_kind")]
    pub kind: RelayKind,
    #[serde(default = "default_jito_url")]
    pub url: String,
    #[serde(default = "default_http_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            kind: default_relay_kind(),
            url: default_jito_url(),
            timeout_ms: default_http_timeout_ms(),
        }
    }
}

/// Balance synchronization
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Maximum concurrent balance queries
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Minimum duration of a manual refresh
    #[serde(default = "default_manual_refresh_floor_ms")]
    pub manual_refresh_floor_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            manual_refresh_floor_ms: default_manual_refresh_floor_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Slippage percentage passed to the builder
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: u32,
    #[serde(default = "default_priority_fee_sol")]
    pub priority_fee_sol: f64,
    /// SOL each wallet must keep on top of a buy amount
    #[serde(default = "default_fee_reserve_sol")]
    pub fee_reserve_sol: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            slippage_pct: default_slippage_pct(),
            priority_fee_sol: default_priority_fee_sol(),
            fee_reserve_sol: default_fee_reserve_sol(),
        }
    }
}

/// One trading venue: id used by the operator, pool name sent to the builder
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VenueEntry {
    pub id: String,
    pub pool: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenuesConfig {
    /// Venue used when no recommendation is available
    #[serde(default = "default_venue")]
    pub default: String,
    #[serde(default = "default_venue_list")]
    pub list: Vec<VenueEntry>,
}

impl Default for VenuesConfig {
    fn default() -> Self {
        Self {
            default: default_venue(),
            list: default_venue_list(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// wallets.json location
    #[serde(default = "default_registry_path")]
    pub registry_path: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    /// Ask before sells, consolidations and burns
    #[serde(default = "default_true")]
    pub require_confirmation: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            require_confirmation: true,
        }
    }
}

// Default value functions
fn default_rpc_endpoint() -> String {
    std::env::var("RPC_ENDPOINT").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into())
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_http_timeout_ms() -> u64 {
    10000
}

fn default_builder_url() -> String {
    std::env::var("BUILDER_URL").unwrap_or_else(|_| "https://pumpportal.fun/api/trade-local".into())
}

fn default_relay_kind() -> RelayKind {
    RelayKind::Jito
}

fn default_jito_url() -> String {
    std::env::var("JITO_BLOCK_ENGINE_URL")
        .unwrap_or_else(|_| "https://ny.mainnet.block-engine.jito.wtf".into())
}

fn default_batch_size() -> usize {
    crate::balance::DEFAULT_BATCH_SIZE
}

fn default_manual_refresh_floor_ms() -> u64 {
    600
}

fn default_slippage_pct() -> u32 {
    25
}

fn default_priority_fee_sol() -> f64 {
    0.0005
}

fn default_fee_reserve_sol() -> f64 {
    0.01
}

fn default_venue() -> String {
    "pump".to_string()
}

fn default_venue_list() -> Vec<VenueEntry> {
    ["pump", "pump-amm", "raydium"]
        .iter()
        .map(|id| VenueEntry {
            id: id.to_string(),
            pool: id.to_string(),
        })
        .collect()
}

fn default_registry_path() -> String {
    "wallets.json".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.timeout_ms", default_timeout_ms() as i64)?
            .set_default("builder.url", default_builder_url())?
            .set_default("relay.url", default_jito_url())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix FLEET__)
            .add_source(
                config::Environment::with_prefix("FLEET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("rpc.endpoint", &self.rpc.endpoint),
            ("builder.url", &self.builder.url),
            ("relay.url", &self.relay.url),
        ] {
            url::Url::parse(value).with_context(|| format!("Invalid {}: {}", name, value))?;
        }

        if self.sync.batch_size == 0 {
            anyhow::bail!("sync.batch_size must be at least 1");
        }

        if self.trading.slippage_pct > 100 {
            anyhow::bail!("slippage_pct cannot exceed 100");
        }

        if self.trading.priority_fee_sol < 0.0 || self.trading.fee_reserve_sol < 0.0 {
            anyhow::bail!("priority_fee_sol and fee_reserve_sol must not be negative");
        }

        // Venue ids must be unique and the default must exist
        let mut seen = HashSet::new();
        for venue in &self.venues.list {
            if venue.id.trim().is_empty() || venue.pool.trim().is_empty() {
                anyhow::bail!("Venue entries need a non-empty id and pool");
            }
            if !seen.insert(venue.id.as_str()) {
                anyhow::bail!("Duplicate venue id: {}", venue.id);
            }
        }
        if !seen.contains(self.venues.default.as_str()) {
            anyhow::bail!(
                "Default venue '{}' is not in venues.list",
                self.venues.default
            );
        }

        if self.relay.kind == RelayKind::Rpc && self.relay.url.contains("block-engine") {
            tracing::warn!("relay.kind is 'rpc' but relay.url looks like a Jito block engine");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        let venues: Vec<String> = self
            .venues
            .list
            .iter()
            .map(|v| format!("{} ({})", v.id, v.pool))
            .collect();

        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    timeout: {}ms
  Builder:
    url: {}
    timeout: {}ms
  Relay:
    kind: {}
    url: {}
  Sync:
    batch_size: {}
    manual_refresh_floor: {}ms
  Trading:
    slippage: {}%
    priority_fee: {} SOL
    fee_reserve: {} SOL
  Venues:
    default: {}
    available: {}
  Wallets:
    registry: {}
  Safety:
    require_confirmation: {}
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            mask_url(&self.builder.url),
            self.builder.timeout_ms,
            self.relay.kind,
            mask_url(&self.relay.url),
            self.sync.batch_size,
            self.sync.manual_refresh_floor_ms,
            self.trading.slippage_pct,
            self.trading.priority_fee_sol,
            self.trading.fee_reserve_sol,
            self.venues.default,
            venues.join(", "),
            self.wallet.registry_path,
            self.safety.require_confirmation,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
