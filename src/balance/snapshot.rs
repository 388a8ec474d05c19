//! Balance snapshots
//!
//! A `BalanceSnapshot` is an immutable value. The synchronizer builds a fresh
//! one per pass and the coordinator merges it with the previous snapshot into
//! a third; nothing patches a snapshot in place.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Secondary asset reference (SPL token mint address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Returns `None` for a blank reference
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-wallet balance as seen by readers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BalanceState {
    Known(f64),
    Unknown,
}

impl BalanceState {
    pub fn known(&self) -> Option<f64> {
        match self {
            BalanceState::Known(v) => Some(*v),
            BalanceState::Unknown => None,
        }
    }
}

impl fmt::Display for BalanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceState::Known(v) => write!(f, "{:.4}", v),
            BalanceState::Unknown => write!(f, "?"),
        }
    }
}

/// Native and selected-asset balances keyed by wallet address.
///
/// An address missing from a map means "unknown", never zero.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSnapshot {
    /// SOL balances
    pub native: HashMap<String, f64>,
    /// Selected asset balances (empty when no asset is selected)
    pub asset: HashMap<String, f64>,
    /// Asset the `asset` map refers to
    pub asset_ref: Option<AssetId>,
    /// Addresses that were part of the pass that produced this snapshot
    pub wallets: HashSet<String>,
    /// Sync generation that produced this snapshot (0 = never synced)
    pub generation: u64,
    pub taken_at: DateTime<Utc>,
}

impl Default for BalanceSnapshot {
    fn default() -> Self {
        Self::empty(None)
    }
}

impl BalanceSnapshot {
    pub fn empty(asset_ref: Option<AssetId>) -> Self {
        Self {
            native: HashMap::new(),
            asset: HashMap::new(),
            asset_ref,
            wallets: HashSet::new(),
            generation: 0,
            taken_at: Utc::now(),
        }
    }

    pub fn native_state(&self, address: &str) -> BalanceState {
        match self.native.get(address) {
            Some(v) => BalanceState::Known(*v),
            None => BalanceState::Unknown,
        }
    }

    pub fn asset_state(&self, address: &str) -> BalanceState {
        match self.asset.get(address) {
            Some(v) => BalanceState::Known(*v),
            None => BalanceState::Unknown,
        }
    }

    /// Sum of known native balances
    pub fn total_native(&self) -> f64 {
        self.native.values().sum()
    }

    /// Sum of known asset balances
    pub fn total_asset(&self) -> f64 {
        self.asset.values().sum()
    }

    /// Number of queried wallets whose native balance is unknown
    pub fn unknown_native(&self) -> usize {
        self.wallets
            .iter()
            .filter(|a| !self.native.contains_key(*a))
            .count()
    }

    /// Merge a fresh pass result on top of this snapshot.
    ///
    /// - Fresh known values win.
    /// - A value this snapshot knows survives when the fresh pass failed for
    ///   that wallet, so a transient failure never turns known into unknown.
    /// - Wallets absent from the fresh pass are dropped.
    /// - Asset values are only carried over when the asset reference matches.
    pub fn merge(&self, fresh: &BalanceSnapshot) -> BalanceSnapshot {
        let carry_asset = self.asset_ref == fresh.asset_ref;
        let mut native = HashMap::with_capacity(fresh.wallets.len());
        let mut asset = HashMap::with_capacity(fresh.wallets.len());

        for address in &fresh.wallets {
            if let Some(v) = fresh.native.get(address).or_else(|| self.native.get(address)) {
                native.insert(address.clone(), *v);
            }

            let previous_asset = if carry_asset {
                self.asset.get(address)
            } else {
                None
            };
            if let Some(v) = fresh.asset.get(address).or(previous_asset) {
                asset.insert(address.clone(), *v);
            }
        }

        BalanceSnapshot {
            native,
            asset,
            asset_ref: fresh.asset_ref.clone(),
            wallets: fresh.wallets.clone(),
            generation: fresh.generation,
            taken_at: fresh.taken_at,
        }
    }

    /// Copy of this snapshot restricted to `addresses`
    pub fn pruned<'a>(&self, addresses: impl IntoIterator<Item = &'a str>) -> BalanceSnapshot {
        let keep: HashSet<String> = addresses.into_iter().map(str::to_string).collect();
        BalanceSnapshot {
            native: retain_keys(&self.native, &keep),
            asset: retain_keys(&self.asset, &keep),
            asset_ref: self.asset_ref.clone(),
            wallets: self.wallets.intersection(&keep).cloned().collect(),
            generation: self.generation,
            taken_at: self.taken_at,
        }
    }
}

fn retain_keys(map: &HashMap<String, f64>, keep: &HashSet<String>) -> HashMap<String, f64> {
    map.iter()
        .filter(|(k, _)| keep.contains(*k))
        .map(|(k, v)| (k.clone(), *v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(native: &[(&str, f64)], wallets: &[&str], asset: Option<&str>) -> BalanceSnapshot {
        let mut s = BalanceSnapshot::empty(asset.and_then(AssetId::parse));
        s.native = native.iter().map(|(a, v)| (a.to_string(), *v)).collect();
        s.wallets = wallets.iter().map(|a| a.to_string()).collect();
        s
    }

    #[test]
    fn test_asset_id_parse() {
        assert!(AssetId::parse("  ").is_none());
        assert_eq!(AssetId::parse(" mint ").unwrap().as_str(), "mint");
    }

    #[test]
    fn test_unknown_is_not_zero() {
        let s = snapshot(&[("W1", 0.0)], &["W1", "W2"], None);
        assert_eq!(s.native_state("W1"), BalanceState::Known(0.0));
        assert_eq!(s.native_state("W2"), BalanceState::Unknown);
        assert_eq!(s.unknown_native(), 1);
    }

    #[test]
    fn test_merge_keeps_known_over_failure() {
        let previous = snapshot(&[("W1", 1.0), ("W2", 2.0)], &["W1", "W2"], None);
        let fresh = snapshot(&[("W1", 1.5)], &["W1", "W2"], None);

        let merged = previous.merge(&fresh);
        assert_eq!(merged.native.get("W1"), Some(&1.5));
        assert_eq!(merged.native.get("W2"), Some(&2.0));
    }

    #[test]
    fn test_merge_prunes_removed_wallets() {
        let previous = snapshot(&[("W1", 1.0), ("W2", 2.0)], &["W1", "W2"], None);
        let fresh = snapshot(&[("W1", 1.0)], &["W1"], None);

        let merged = previous.merge(&fresh);
        assert!(!merged.native.contains_key("W2"));
        assert!(!merged.wallets.contains("W2"));
    }

    #[test]
    fn test_merge_drops_asset_on_asset_change() {
        let mut previous = snapshot(&[("W1", 1.0)], &["W1"], Some("mintA"));
        previous.asset.insert("W1".into(), 500.0);
        let fresh = snapshot(&[("W1", 1.0)], &["W1"], Some("mintB"));

        let merged = previous.merge(&fresh);
        assert!(merged.asset.is_empty());
        assert_eq!(merged.asset_ref, AssetId::parse("mintB"));
    }

    #[test]
    fn test_pruned() {
        let s = snapshot(&[("W1", 1.0), ("W2", 2.0)], &["W1", "W2"], None);
        let p = s.pruned(["W2"]);
        assert_eq!(p.native.len(), 1);
        assert_eq!(p.total_native(), 2.0);
    }
}
