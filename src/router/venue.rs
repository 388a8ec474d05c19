//! Trading venues
//!
//! A venue is a pair of executors (buy and sell) behind one id. The registry
//! is built once from config; lookups never branch on the id string.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{TradingConfig, VenuesConfig};
use crate::error::{Error, Result};
use crate::trading::{Amount, BatchOutcome, OperationSpec, SigningPipeline, TradeSide, VenueTrade};
use crate::wallet::Wallet;

/// Buy and sell capabilities of one venue
#[async_trait]
pub trait VenueExecutor: Send + Sync {
    /// Spend `amount_sol` from each wallet on `token`
    async fn buy(&self, wallets: &[&Wallet], token: &str, amount_sol: f64) -> BatchOutcome;

    /// Sell `percent` of each wallet's `token` holding
    async fn sell(&self, wallets: &[&Wallet], token: &str, percent: f64) -> BatchOutcome;
}

/// Registered venue
#[derive(Clone)]
pub struct VenueDescriptor {
    pub id: String,
    pub executor: Arc<dyn VenueExecutor>,
}

impl std::fmt::Debug for VenueDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VenueDescriptor").field("id", &self.id).finish()
    }
}

/// Venue lookup table with a designated default
#[derive(Debug)]
pub struct VenueRegistry {
    venues: HashMap<String, VenueDescriptor>,
    order: Vec<String>,
    default_id: String,
}

impl VenueRegistry {
    pub fn new(default_id: impl Into<String>) -> Self {
        Self {
            venues: HashMap::new(),
            order: Vec::new(),
            default_id: default_id.into(),
        }
    }

    /// One `PipelineVenue` per configured venue, all sharing `pipeline`
    pub fn from_config(
        venues: &VenuesConfig,
        trading: &TradingConfig,
        pipeline: Arc<SigningPipeline>,
    ) -> Result<Self> {
        let mut registry = Self::new(venues.default.clone());
        for entry in &venues.list {
            let executor = PipelineVenue::new(&entry.pool, pipeline.clone(), trading);
            registry.register(&entry.id, Arc::new(executor))?;
        }

        if registry.get(&registry.default_id).is_err() {
            return Err(Error::Config(format!(
                "Default venue '{}' is not registered",
                registry.default_id
            )));
        }

        info!(
            "Registered {} venues (default: {})",
            registry.order.len(),
            registry.default_id
        );
        Ok(registry)
    }

    pub fn register(&mut self, id: &str, executor: Arc<dyn VenueExecutor>) -> Result<()> {
        if self.venues.contains_key(id) {
            return Err(Error::DuplicateVenue(id.to_string()));
        }
        debug!("Registering venue {}", id);
        self.venues.insert(
            id.to_string(),
            VenueDescriptor {
                id: id.to_string(),
                executor,
            },
        );
        self.order.push(id.to_string());
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&VenueDescriptor> {
        self.venues
            .get(id)
            .ok_or_else(|| Error::UnknownVenue(id.to_string()))
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub fn default_venue(&self) -> Result<&VenueDescriptor> {
        self.get(&self.default_id)
    }

    /// Venue ids in registration order
    pub fn ids(&self) -> &[String] {
        &self.order
    }
}

/// Venue backed by the signing pipeline, trading on one builder pool
pub struct PipelineVenue {
    pool: String,
    pipeline: Arc<SigningPipeline>,
    slippage_pct: u32,
    priority_fee: f64,
}

impl PipelineVenue {
    pub fn new(pool: &str, pipeline: Arc<SigningPipeline>, trading: &TradingConfig) -> Self {
        Self {
            pool: pool.to_string(),
            pipeline,
            slippage_pct: trading.slippage_pct,
            priority_fee: trading.priority_fee_sol,
        }
    }

    fn trade(&self, side: TradeSide, token: &str, amount: Amount) -> OperationSpec {
        OperationSpec::VenueTrade(VenueTrade {
            pool: self.pool.clone(),
            side,
            token: token.to_string(),
            amount,
            slippage_pct: self.slippage_pct,
            priority_fee: self.priority_fee,
        })
    }
}

#[async_trait]
impl VenueExecutor for PipelineVenue {
    async fn buy(&self, wallets: &[&Wallet], token: &str, amount_sol: f64) -> BatchOutcome {
        let op = self.trade(TradeSide::Buy, token, Amount::Fixed(amount_sol));
        self.pipeline.execute(&op, wallets).await
    }

    async fn sell(&self, wallets: &[&Wallet], token: &str, percent: f64) -> BatchOutcome {
        let op = self.trade(TradeSide::Sell, token, Amount::Percent(percent));
        self.pipeline.execute(&op, wallets).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VenueEntry;
    use crate::trading::mock::{MockBuilder, MockRelay};
    use crate::wallet::SecretKey;
    use solana_sdk::signature::Keypair;

    fn pipeline(builder: Arc<MockBuilder>) -> Arc<SigningPipeline> {
        Arc::new(SigningPipeline::new(
            builder,
            Arc::new(MockRelay::accepting("sig1")),
        ))
    }

    fn venues(default: &str, ids: &[(&str, &str)]) -> VenuesConfig {
        VenuesConfig {
            default: default.to_string(),
            list: ids
                .iter()
                .map(|(id, pool)| VenueEntry {
                    id: id.to_string(),
                    pool: pool.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_registry_from_config() {
        let registry = VenueRegistry::from_config(
            &venues("pump", &[("pump", "pump"), ("raydium", "raydium")]),
            &TradingConfig::default(),
            pipeline(Arc::new(MockBuilder::valid())),
        )
        .unwrap();

        assert_eq!(registry.ids(), &["pump".to_string(), "raydium".to_string()]);
        assert_eq!(registry.default_venue().unwrap().id, "pump");
        assert!(matches!(registry.get("orca"), Err(Error::UnknownVenue(_))));
    }

    #[test]
    fn test_duplicate_and_missing_default() {
        let dup = VenueRegistry::from_config(
            &venues("pump", &[("pump", "pump"), ("pump", "pump-amm")]),
            &TradingConfig::default(),
            pipeline(Arc::new(MockBuilder::valid())),
        );
        assert!(matches!(dup, Err(Error::DuplicateVenue(_))));

        let missing = VenueRegistry::from_config(
            &venues("orca", &[("pump", "pump")]),
            &TradingConfig::default(),
            pipeline(Arc::new(MockBuilder::valid())),
        );
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_pipeline_venue_sends_pool_and_percent() {
        let builder = Arc::new(MockBuilder::valid());
        let venue = PipelineVenue::new("pump-amm", pipeline(builder.clone()), &TradingConfig::default());
        let wallet = Wallet::new("w", SecretKey::from_keypair(Keypair::new()), true);

        let batch = venue.sell(&[&wallet], "Mint111", 50.0).await;
        assert!(batch.all_succeeded());

        let payload = &builder.payloads()[0];
        assert!(payload.contains("\"pool\":\"pump-amm\""));
        assert!(payload.contains("\"amount\":\"50%\""));
        assert!(payload.contains("\"action\":\"sell\""));
    }
}
