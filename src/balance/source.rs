//! Balance data source
//!
//! The synchronizer only depends on [`BalanceSource`]. The production source
//! reads Solana RPC: `getBalance` for SOL and the owner's associated token
//! account for SPL assets.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::config::RpcConfig;
use crate::error::{Error, Result};

use super::snapshot::AssetId;

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Read access to per-wallet balances.
///
/// `Ok(None)` means the account does not exist ("not found").
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Native (SOL) balance of `address`
    async fn native_balance(&self, address: &str) -> Result<Option<f64>>;

    /// Balance of `asset` held by `address`
    async fn asset_balance(&self, address: &str, asset: &AssetId) -> Result<Option<f64>>;
}

/// Solana RPC backed balance source
pub struct RpcBalanceSource {
    client: RpcClient,
    timeout_ms: u64,
}

impl RpcBalanceSource {
    pub fn new(config: &RpcConfig) -> Self {
        Self {
            client: RpcClient::new_with_timeout(
                config.endpoint.clone(),
                Duration::from_millis(config.timeout_ms),
            ),
            timeout_ms: config.timeout_ms,
        }
    }

    fn rpc_error(&self, e: ClientError) -> Error {
        classify_client_error(e, self.timeout_ms)
    }

    /// Round-trip `getVersion`, returning latency in ms
    pub async fn ping(&self) -> Result<u128> {
        let start = std::time::Instant::now();
        self.client
            .get_version()
            .await
            .map_err(|e| Error::RpcConnection(e.to_string()))?;
        Ok(start.elapsed().as_millis())
    }
}

#[async_trait]
impl BalanceSource for RpcBalanceSource {
    async fn native_balance(&self, address: &str) -> Result<Option<f64>> {
        let owner = parse_pubkey(address)?;
        let lamports = self
            .client
            .get_balance(&owner)
            .await
            .map_err(|e| self.rpc_error(e))?;
        Ok(Some(lamports_to_sol(lamports)))
    }

    async fn asset_balance(&self, address: &str, asset: &AssetId) -> Result<Option<f64>> {
        let owner = parse_pubkey(address)?;
        let mint = parse_pubkey(asset.as_str())?;
        let ata = spl_associated_token_account::get_associated_token_address(&owner, &mint);

        match self.client.get_token_account_balance(&ata).await {
            Ok(amount) => Ok(Some(
                amount
                    .ui_amount
                    .or_else(|| amount.ui_amount_string.parse().ok())
                    .unwrap_or(0.0),
            )),
            Err(e) if is_account_not_found(&e.to_string()) => {
                debug!("No token account for {} / {}", address, asset);
                Ok(None)
            }
            Err(e) => Err(self.rpc_error(e)),
        }
    }
}

fn parse_pubkey(s: &str) -> Result<Pubkey> {
    Pubkey::from_str(s).map_err(|e| Error::InvalidAddress(format!("{}: {}", s, e)))
}

/// Timed-out requests become [`Error::RpcTimeout`]; the rest follow the
/// `From<ClientError>` classification.
fn classify_client_error(e: ClientError, timeout_ms: u64) -> Error {
    match e.kind() {
        ClientErrorKind::Reqwest(re) if re.is_timeout() => Error::RpcTimeout(timeout_ms),
        ClientErrorKind::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
            Error::RpcTimeout(timeout_ms)
        }
        _ => e.into(),
    }
}

fn is_account_not_found(message: &str) -> bool {
    message.contains("could not find account") || message.contains("AccountNotFound")
}

/// Convert lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL
}

/// Convert SOL to lamports
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL) as u64
}
