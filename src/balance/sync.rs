//! Fleet balance synchronization
//!
//! `BalanceSynchronizer` runs one pass: wallets are split into batches of at
//! most `batch_size`, each batch is queried concurrently and batches run one
//! after another, which caps the number of outstanding RPC requests.
//!
//! `SyncCoordinator` sits on top and owns the published snapshot. Each refresh
//! takes a generation ticket; a pass that lands after a newer one has already
//! been committed is dropped, so overlapping triggers cannot roll the view back.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};

use super::snapshot::{AssetId, BalanceSnapshot};
use super::source::BalanceSource;

/// Default number of wallets queried concurrently
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Outcome of one wallet's query
#[derive(Debug)]
struct WalletBalances {
    address: String,
    native: Option<f64>,
    asset: Option<f64>,
    native_error: Option<Error>,
}

/// Batched concurrent balance fetcher
pub struct BalanceSynchronizer {
    source: Arc<dyn BalanceSource>,
    batch_size: usize,
}

impl BalanceSynchronizer {
    pub fn new(source: Arc<dyn BalanceSource>, batch_size: usize) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(source: Arc<dyn BalanceSource>, config: &SyncConfig) -> Self {
        Self::new(source, config.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sync with the configured batch size
    pub async fn sync(
        &self,
        addresses: &[String],
        asset_ref: Option<&AssetId>,
    ) -> Result<BalanceSnapshot> {
        self.sync_with_limit(addresses, asset_ref, self.batch_size)
            .await
    }

    /// Query every address and build a fresh snapshot.
    ///
    /// Per-wallet failures leave that wallet unknown. The call only fails when
    /// every native query failed to reach the source at all.
    pub async fn sync_with_limit(
        &self,
        addresses: &[String],
        asset_ref: Option<&AssetId>,
        concurrency_limit: usize,
    ) -> Result<BalanceSnapshot> {
        let limit = concurrency_limit.max(1);
        let mut snapshot = BalanceSnapshot::empty(asset_ref.cloned());
        if addresses.is_empty() {
            return Ok(snapshot);
        }

        debug!(
            "Syncing {} wallets in batches of {} (asset: {})",
            addresses.len(),
            limit,
            asset_ref.map(|a| a.as_str()).unwrap_or("none")
        );

        let mut results = Vec::with_capacity(addresses.len());
        for (i, batch) in addresses.chunks(limit).enumerate() {
            let futures = batch
                .iter()
                .map(|address| self.query_wallet(address, asset_ref));
            let batch_results = join_all(futures).await;
            debug!("Batch {} done ({} wallets)", i + 1, batch_results.len());
            results.extend(batch_results);
        }

        let unreachable = results
            .iter()
            .filter(|r| r.native_error.as_ref().is_some_and(Error::is_unreachable))
            .count();
        if unreachable == results.len() {
            let reason = results
                .iter()
                .find_map(|r| r.native_error.as_ref())
                .map(|e| e.to_string())
                .unwrap_or_default();
            return Err(Error::BalanceSourceUnavailable(reason));
        }

        let mut native = HashMap::with_capacity(results.len());
        let mut asset = HashMap::new();
        let mut wallets = HashSet::with_capacity(results.len());
        for r in results {
            // Later entries overwrite earlier ones for duplicate addresses
            match r.native {
                Some(v) => native.insert(r.address.clone(), v),
                None => native.remove(&r.address),
            };
            match r.asset {
                Some(v) => asset.insert(r.address.clone(), v),
                None => asset.remove(&r.address),
            };
            wallets.insert(r.address);
        }

        let unknown = wallets.len() - native.len();
        if unknown > 0 {
            warn!("{} of {} wallet balances unknown after sync", unknown, wallets.len());
        }

        snapshot.native = native;
        snapshot.asset = asset;
        snapshot.wallets = wallets;
        snapshot.taken_at = Utc::now();
        Ok(snapshot)
    }

    async fn query_wallet(&self, address: &str, asset_ref: Option<&AssetId>) -> WalletBalances {
        let (native, native_error) = match self.source.native_balance(address).await {
            Ok(v) => (Some(v.unwrap_or(0.0)), None),
            Err(e) => {
                debug!("Native balance query failed for {}: {}", address, e);
                (None, Some(e))
            }
        };

        let asset = match asset_ref {
            Some(asset_ref) => match self.source.asset_balance(address, asset_ref).await {
                Ok(v) => Some(v.unwrap_or(0.0)),
                Err(e) => {
                    debug!("Asset balance query failed for {}: {}", address, e);
                    None
                }
            },
            None => None,
        };

        WalletBalances {
            address: address.to_string(),
            native,
            asset,
            native_error,
        }
    }
}

/// Why a re-sync was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    WalletCountChanged,
    AssetChanged,
    OperationCompleted,
    Manual,
}

/// Generation token handed out when a refresh starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTicket {
    pub generation: u64,
    pub trigger: SyncTrigger,
}

/// Owns the published snapshot and orders overlapping refreshes
pub struct SyncCoordinator {
    synchronizer: BalanceSynchronizer,
    current: RwLock<Arc<BalanceSnapshot>>,
    next_generation: AtomicU64,
    /// Wallet count and asset seen by the last trigger check
    observed: Mutex<(usize, Option<AssetId>)>,
    manual_floor: Duration,
}

impl SyncCoordinator {
    pub fn new(synchronizer: BalanceSynchronizer, manual_floor: Duration) -> Self {
        Self {
            synchronizer,
            current: RwLock::new(Arc::new(BalanceSnapshot::default())),
            next_generation: AtomicU64::new(1),
            observed: Mutex::new((0, None)),
            manual_floor,
        }
    }

    pub fn from_config(source: Arc<dyn BalanceSource>, config: &SyncConfig) -> Self {
        Self::new(
            BalanceSynchronizer::from_config(source, config),
            Duration::from_millis(config.manual_refresh_floor_ms),
        )
    }

    /// Current published snapshot
    pub async fn snapshot(&self) -> Arc<BalanceSnapshot> {
        self.current.read().await.clone()
    }

    /// Report the current wallet count and asset; returns a trigger when
    /// either changed since the last check.
    pub fn detect_trigger(&self, wallet_count: usize, asset: Option<&AssetId>) -> Option<SyncTrigger> {
        let mut observed = match self.observed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let trigger = if observed.0 != wallet_count {
            Some(SyncTrigger::WalletCountChanged)
        } else if observed.1.as_ref() != asset {
            Some(SyncTrigger::AssetChanged)
        } else {
            None
        };

        *observed = (wallet_count, asset.cloned());
        trigger
    }

    /// Start a refresh and get its generation
    pub fn begin(&self, trigger: SyncTrigger) -> SyncTicket {
        SyncTicket {
            generation: self.next_generation.fetch_add(1, Ordering::SeqCst),
            trigger,
        }
    }

    /// Publish a pass result unless a newer generation is already published.
    ///
    /// Returns whether the snapshot was applied.
    pub async fn commit(&self, ticket: SyncTicket, mut fresh: BalanceSnapshot) -> bool {
        let mut current = self.current.write().await;
        if ticket.generation <= current.generation {
            debug!(
                "Dropping stale sync generation {} (published: {})",
                ticket.generation, current.generation
            );
            return false;
        }

        fresh.generation = ticket.generation;
        let merged = current.merge(&fresh);
        *current = Arc::new(merged);
        true
    }

    /// Run a full refresh for `addresses` and publish it.
    ///
    /// Manual refreshes take at least the configured floor so the operator
    /// can see that something happened.
    pub async fn refresh(
        &self,
        addresses: &[String],
        asset: Option<&AssetId>,
        trigger: SyncTrigger,
    ) -> Result<Arc<BalanceSnapshot>> {
        let ticket = self.begin(trigger);
        let started = Instant::now();

        info!(
            "Refreshing balances for {} wallets ({:?}, generation {})",
            addresses.len(),
            trigger,
            ticket.generation
        );

        let result = self.synchronizer.sync(addresses, asset).await;

        if trigger == SyncTrigger::Manual {
            let elapsed = started.elapsed();
            if elapsed < self.manual_floor {
                tokio::time::sleep(self.manual_floor - elapsed).await;
            }
        }

        self.commit(ticket, result?).await;
        Ok(self.snapshot().await)
    }
}
