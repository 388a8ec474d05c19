//! Wallet store
//!
//! Ordered in-memory collection of fleet wallets. Loaded from a `wallets.json`
//! registry; the registry only names where key material lives, it never
//! receives key material back.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::secret::SecretKey;

/// A fleet wallet: public address, secret key and activation flag
#[derive(Debug)]
pub struct Wallet {
    /// Human-readable label
    pub name: String,
    address: String,
    secret: SecretKey,
    /// Inactive wallets are skipped by trades
    pub active: bool,
}

impl Wallet {
    /// Create a wallet; the address is derived from the secret
    pub fn new(name: impl Into<String>, secret: SecretKey, active: bool) -> Self {
        Self {
            name: name.into(),
            address: secret.pubkey().to_string(),
            secret,
            active,
        }
    }

    /// Base58 address, the wallet's stable identity
    pub fn address(&self) -> &str {
        &self.address
    }

    /// First characters of the address, for log lines
    pub fn short_address(&self) -> &str {
        &self.address[..self.address.len().min(8)]
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

/// Registry entry from wallets.json
#[derive(Debug, Clone, Deserialize)]
pub struct WalletEntry {
    /// Unique identifier, e.g. "sniper-03"
    pub name: String,

    /// Path to a Solana CLI keypair file (relative to the registry file)
    #[serde(default)]
    pub keypair_path: Option<PathBuf>,

    /// Base58 encoded secret key, used when no keypair file is given
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Whether the wallet participates in trades
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// wallets.json structure
#[derive(Debug, Clone, Deserialize)]
pub struct WalletRegistry {
    #[serde(default = "default_version")]
    pub version: String,
    pub wallets: Vec<WalletEntry>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Ordered wallet collection
#[derive(Debug, Default)]
pub struct WalletStore {
    wallets: Vec<Wallet>,
}

impl WalletStore {
    pub fn new(wallets: Vec<Wallet>) -> Self {
        Self { wallets }
    }

    /// Load wallets from a registry file.
    ///
    /// Entries whose key material cannot be loaded are skipped with a warning.
    /// A missing registry yields an empty store.
    pub fn load(registry_path: &Path) -> Result<Self> {
        if !registry_path.exists() {
            warn!(
                "Wallet registry {} not found, starting with an empty fleet",
                registry_path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(registry_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", registry_path.display(), e))
        })?;
        let registry: WalletRegistry = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", registry_path.display(), e))
        })?;

        let base_dir = registry_path.parent().unwrap_or_else(|| Path::new("."));
        let mut wallets = Vec::with_capacity(registry.wallets.len());

        for entry in &registry.wallets {
            match Self::load_entry(entry, base_dir) {
                Ok(wallet) => {
                    debug!("Loaded wallet {} ({})", wallet.name, wallet.short_address());
                    wallets.push(wallet);
                }
                Err(e) => warn!("Skipping wallet {}: {}", entry.name, e),
            }
        }

        info!(
            "Loaded {} of {} wallets from registry v{}",
            wallets.len(),
            registry.wallets.len(),
            registry.version
        );

        Ok(Self { wallets })
    }

    fn load_entry(entry: &WalletEntry, base_dir: &Path) -> Result<Wallet> {
        let secret = match (&entry.keypair_path, &entry.secret_key) {
            (Some(path), _) => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    base_dir.join(path)
                };
                SecretKey::from_keypair_file(&path)?
            }
            (None, Some(encoded)) => SecretKey::from_base58(encoded)?,
            (None, None) => {
                return Err(Error::InvalidKeypair(
                    "entry has neither keypair_path nor secret_key".to_string(),
                ))
            }
        };

        Ok(Wallet::new(entry.name.clone(), secret, entry.active))
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// All wallets in store order
    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    /// Active wallets in store order
    pub fn active_wallets(&self) -> Vec<&Wallet> {
        self.wallets.iter().filter(|w| w.active).collect()
    }

    /// Addresses in store order
    pub fn addresses(&self) -> Vec<String> {
        self.wallets.iter().map(|w| w.address.clone()).collect()
    }

    /// Find wallet by address
    pub fn get(&self, address: &str) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.address == address)
    }

    /// Resolve a list of addresses, failing on the first unknown one
    pub fn resolve(&self, addresses: &[String]) -> Result<Vec<&Wallet>> {
        addresses
            .iter()
            .map(|addr| {
                self.get(addr)
                    .ok_or_else(|| Error::WalletNotFound(addr.clone()))
            })
            .collect()
    }

    pub fn push(&mut self, wallet: Wallet) {
        self.wallets.push(wallet);
    }

    /// Remove a wallet, returning it if it was present
    pub fn remove(&mut self, address: &str) -> Option<Wallet> {
        let idx = self.wallets.iter().position(|w| w.address == address)?;
        Some(self.wallets.remove(idx))
    }

    pub fn set_active(&mut self, address: &str, active: bool) -> Result<()> {
        let wallet = self
            .wallets
            .iter_mut()
            .find(|w| w.address == address)
            .ok_or_else(|| Error::WalletNotFound(address.to_string()))?;
        wallet.active = active;
        Ok(())
    }
}
