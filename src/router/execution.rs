//! Execution router
//!
//! Validates a `TradeIntent` against the wallet store and the latest balance
//! snapshot, picks a venue and hands the trade to that venue's executor.
//! Every validation failure is returned before any network call.

use tracing::{debug, info, warn};

use crate::balance::{BalanceSnapshot, BalanceState};
use crate::error::{Error, Result};
use crate::trading::BatchOutcome;
use crate::wallet::{Wallet, WalletStore};

use super::intent::{TradeIntent, TradeMode, VenueSelection};
use super::venue::{VenueDescriptor, VenueRegistry};

/// Trade dispatcher
pub struct ExecutionRouter {
    registry: VenueRegistry,
    /// SOL each wallet must keep on top of its buy amount for fees
    fee_reserve_sol: f64,
}

impl ExecutionRouter {
    pub fn new(registry: VenueRegistry, fee_reserve_sol: f64) -> Self {
        Self {
            registry,
            fee_reserve_sol,
        }
    }

    pub fn registry(&self) -> &VenueRegistry {
        &self.registry
    }

    /// Validate and dispatch a trade
    pub async fn submit(
        &self,
        intent: &TradeIntent,
        store: &WalletStore,
        snapshot: &BalanceSnapshot,
    ) -> Result<BatchOutcome> {
        let wallets = self.validate(intent, store, snapshot)?;
        let venue = self.select_venue(&intent.venue)?;

        info!(
            "Routing {} of {} to {} for {} wallets",
            intent.mode,
            intent.token,
            venue.id,
            wallets.len()
        );

        let outcome = match intent.mode {
            TradeMode::Buy => venue.executor.buy(&wallets, &intent.token, intent.amount).await,
            TradeMode::Sell => venue.executor.sell(&wallets, &intent.token, intent.amount).await,
        };
        Ok(outcome)
    }

    /// Run the pre-dispatch checks in order, returning the active wallets
    pub fn validate<'a>(
        &self,
        intent: &TradeIntent,
        store: &'a WalletStore,
        snapshot: &BalanceSnapshot,
    ) -> Result<Vec<&'a Wallet>> {
        // 1. at least one selected wallet is active
        let wallets: Vec<&Wallet> = store
            .resolve(&intent.wallets)?
            .into_iter()
            .filter(|w| w.active)
            .collect();
        if wallets.is_empty() {
            return Err(Error::NoActiveWallets);
        }

        // 2. token
        if intent.token.trim().is_empty() {
            return Err(Error::EmptyToken);
        }

        match intent.mode {
            // 3. every wallet covers its share plus the fee reserve
            TradeMode::Buy => {
                if !intent.amount.is_finite() || intent.amount <= 0.0 {
                    return Err(Error::InvalidAmount(intent.amount.to_string()));
                }
                let required = intent.amount + self.fee_reserve_sol;
                for wallet in &wallets {
                    match snapshot.native_state(wallet.address()) {
                        BalanceState::Known(available) if available >= required => {}
                        BalanceState::Known(available) => {
                            return Err(Error::InsufficientBalance {
                                address: wallet.address().to_string(),
                                available,
                                required,
                            })
                        }
                        BalanceState::Unknown => {
                            return Err(Error::BalanceUnknown(wallet.address().to_string()))
                        }
                    }
                }
            }
            // 4. percentage range
            TradeMode::Sell => {
                if !(intent.amount > 0.0 && intent.amount <= 100.0) {
                    return Err(Error::InvalidPercent(intent.amount));
                }
            }
        }

        debug!("Intent validated for {} wallets", wallets.len());
        Ok(wallets)
    }

    /// Resolve a venue selection; `Auto` without a recommendation uses the default
    pub fn select_venue(&self, selection: &VenueSelection) -> Result<&VenueDescriptor> {
        match selection {
            VenueSelection::Explicit(id) => self.registry.get(id),
            VenueSelection::Auto {
                recommended: Some(id),
            } => self.registry.get(id),
            VenueSelection::Auto { recommended: None } => {
                warn!(
                    "No venue recommendation, falling back to default venue {}",
                    self.registry.default_id()
                );
                self.registry.default_venue()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TradingConfig;
    use crate::router::venue::{PipelineVenue, VenueExecutor};
    use crate::trading::mock::{MockBuilder, MockRelay};
    use crate::trading::{OperationOutcome, SigningPipeline, WalletOutcome};
    use crate::wallet::SecretKey;
    use async_trait::async_trait;
    use solana_sdk::signature::Keypair;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Executor that records calls and answers with a fixed signature
    #[derive(Default)]
    struct CountingVenue {
        buys: AtomicUsize,
        sells: AtomicUsize,
        last_amount: Mutex<Option<f64>>,
    }

    impl CountingVenue {
        fn answer(wallets: &[&Wallet]) -> BatchOutcome {
            BatchOutcome {
                outcomes: wallets
                    .iter()
                    .map(|w| WalletOutcome {
                        address: w.address().to_string(),
                        outcome: OperationOutcome::Done {
                            signature: "sig1".to_string(),
                        },
                    })
                    .collect(),
            }
        }

        fn calls(&self) -> usize {
            self.buys.load(Ordering::SeqCst) + self.sells.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VenueExecutor for CountingVenue {
        async fn buy(&self, wallets: &[&Wallet], _token: &str, amount_sol: f64) -> BatchOutcome {
            self.buys.fetch_add(1, Ordering::SeqCst);
            *self.last_amount.lock().unwrap() = Some(amount_sol);
            Self::answer(wallets)
        }

        async fn sell(&self, wallets: &[&Wallet], _token: &str, percent: f64) -> BatchOutcome {
            self.sells.fetch_add(1, Ordering::SeqCst);
            *self.last_amount.lock().unwrap() = Some(percent);
            Self::answer(wallets)
        }
    }

    struct Fixture {
        store: WalletStore,
        snapshot: BalanceSnapshot,
        alpha: Arc<CountingVenue>,
        beta: Arc<CountingVenue>,
        router: ExecutionRouter,
    }

    impl Fixture {
        /// Wallets with the given native balances; `None` leaves it unknown
        fn new(balances: &[Option<f64>]) -> Self {
            let mut store = WalletStore::default();
            let mut snapshot = BalanceSnapshot::default();
            for (i, balance) in balances.iter().enumerate() {
                let wallet = Wallet::new(format!("w{}", i), SecretKey::from_keypair(Keypair::new()), true);
                snapshot.wallets.insert(wallet.address().to_string());
                if let Some(b) = balance {
                    snapshot.native.insert(wallet.address().to_string(), *b);
                }
                store.push(wallet);
            }

            let alpha = Arc::new(CountingVenue::default());
            let beta = Arc::new(CountingVenue::default());
            let mut registry = VenueRegistry::new("beta");
            registry.register("alpha", alpha.clone()).unwrap();
            registry.register("beta", beta.clone()).unwrap();

            Self {
                store,
                snapshot,
                alpha,
                beta,
                router: ExecutionRouter::new(registry, 0.0),
            }
        }

        fn all(&self) -> Vec<String> {
            self.store.addresses()
        }

        async fn submit(&self, intent: &TradeIntent) -> Result<BatchOutcome> {
            self.router.submit(intent, &self.store, &self.snapshot).await
        }
    }

    fn alpha() -> VenueSelection {
        VenueSelection::Explicit("alpha".to_string())
    }

    #[tokio::test]
    async fn test_buy_within_balance_dispatches() {
        let fx = Fixture::new(&[Some(2.0)]);
        let intent = TradeIntent::buy("Mint111", 1.0, alpha(), fx.all());

        let batch = fx.submit(&intent).await.unwrap();
        assert!(batch.all_succeeded());
        assert_eq!(batch.outcomes[0].outcome.signature(), Some("sig1"));
        assert_eq!(fx.alpha.buys.load(Ordering::SeqCst), 1);
        assert_eq!(*fx.alpha.last_amount.lock().unwrap(), Some(1.0));
    }

    #[tokio::test]
    async fn test_buy_over_balance_never_reaches_network() {
        let builder = Arc::new(MockBuilder::valid());
        let relay = Arc::new(MockRelay::accepting("sig1"));
        let pipeline = Arc::new(SigningPipeline::new(builder.clone(), relay.clone()));

        let fx = Fixture::new(&[Some(2.0)]);
        let mut registry = VenueRegistry::new("alpha");
        registry
            .register(
                "alpha",
                Arc::new(PipelineVenue::new("pump", pipeline, &TradingConfig::default())),
            )
            .unwrap();
        let router = ExecutionRouter::new(registry, 0.0);

        let intent = TradeIntent::buy("Mint111", 5.0, alpha(), fx.all());
        let err = router
            .submit(&intent, &fx.store, &fx.snapshot)
            .await
            .unwrap_err();

        match err {
            Error::InsufficientBalance {
                available,
                required,
                ..
            } => {
                assert_eq!(available, 2.0);
                assert_eq!(required, 5.0);
            }
            other => panic!("expected insufficient balance, got {:?}", other),
        }
        assert_eq!(builder.calls(), 0);
        assert_eq!(relay.calls(), 0);
    }

    #[tokio::test]
    async fn test_buy_through_pipeline_signs_and_submits() {
        let builder = Arc::new(MockBuilder::valid());
        let relay = Arc::new(MockRelay::accepting("sig1"));
        let pipeline = Arc::new(SigningPipeline::new(builder.clone(), relay.clone()));

        let fx = Fixture::new(&[Some(2.0)]);
        let mut registry = VenueRegistry::new("alpha");
        registry
            .register(
                "alpha",
                Arc::new(PipelineVenue::new("pump", pipeline, &TradingConfig::default())),
            )
            .unwrap();
        let router = ExecutionRouter::new(registry, 0.0);

        let intent = TradeIntent::buy("Mint111", 1.0, alpha(), fx.all());
        let batch = router
            .submit(&intent, &fx.store, &fx.snapshot)
            .await
            .unwrap();

        assert!(batch.all_succeeded());
        assert_eq!(batch.outcomes.len(), 1);
        assert_eq!(batch.outcomes[0].outcome.signature(), Some("sig1"));
        assert_eq!(builder.calls(), 1);
        assert_eq!(relay.calls(), 1);
    }

    #[tokio::test]
    async fn test_fee_reserve_counts_toward_requirement() {
        let mut fx = Fixture::new(&[Some(1.0)]);
        let registry = std::mem::replace(&mut fx.router.registry, VenueRegistry::new("x"));
        fx.router = ExecutionRouter::new(registry, 0.01);

        let intent = TradeIntent::buy("Mint111", 1.0, alpha(), fx.all());
        assert!(matches!(
            fx.submit(&intent).await,
            Err(Error::InsufficientBalance { .. })
        ));
        assert_eq!(fx.alpha.calls(), 0);
    }

    #[tokio::test]
    async fn test_one_short_wallet_fails_the_whole_buy() {
        let fx = Fixture::new(&[Some(3.0), Some(0.2)]);
        let intent = TradeIntent::buy("Mint111", 1.0, alpha(), fx.all());
        assert!(matches!(
            fx.submit(&intent).await,
            Err(Error::InsufficientBalance { .. })
        ));
        assert_eq!(fx.alpha.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_balance_blocks_buy() {
        let fx = Fixture::new(&[None]);
        let intent = TradeIntent::buy("Mint111", 0.1, alpha(), fx.all());
        assert!(matches!(
            fx.submit(&intent).await,
            Err(Error::BalanceUnknown(_))
        ));
    }

    #[tokio::test]
    async fn test_inactive_wallets_rejected_first() {
        let mut fx = Fixture::new(&[Some(2.0)]);
        let addr = fx.all()[0].clone();
        fx.store.set_active(&addr, false).unwrap();

        // Empty token would also fail, but the wallet check runs first
        let intent = TradeIntent::buy("", 1.0, alpha(), fx.all());
        assert!(matches!(fx.submit(&intent).await, Err(Error::NoActiveWallets)));

        let none = TradeIntent::buy("Mint111", 1.0, alpha(), vec![]);
        assert!(matches!(fx.submit(&none).await, Err(Error::NoActiveWallets)));
    }

    #[tokio::test]
    async fn test_inactive_wallets_are_skipped() {
        let mut fx = Fixture::new(&[Some(2.0), Some(2.0)]);
        let inactive = fx.all()[1].clone();
        fx.store.set_active(&inactive, false).unwrap();

        let intent = TradeIntent::sell("Mint111", 100.0, alpha(), fx.all());
        let batch = fx.submit(&intent).await.unwrap();
        assert_eq!(batch.outcomes.len(), 1);
        assert!(batch.get(&inactive).is_none());
    }

    #[tokio::test]
    async fn test_empty_token() {
        let fx = Fixture::new(&[Some(2.0)]);
        let intent = TradeIntent::sell("  ", 50.0, alpha(), fx.all());
        assert!(matches!(fx.submit(&intent).await, Err(Error::EmptyToken)));
    }

    #[tokio::test]
    async fn test_sell_percent_range() {
        let fx = Fixture::new(&[None]);
        for bad in [0.0, -5.0, 100.5, f64::NAN] {
            let intent = TradeIntent::sell("Mint111", bad, alpha(), fx.all());
            assert!(matches!(fx.submit(&intent).await, Err(Error::InvalidPercent(_))));
        }

        // Sells do not need a known SOL balance
        let intent = TradeIntent::sell("Mint111", 100.0, alpha(), fx.all());
        assert!(fx.submit(&intent).await.is_ok());
        assert_eq!(fx.alpha.sells.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_venue() {
        let fx = Fixture::new(&[Some(2.0)]);
        let intent = TradeIntent::buy(
            "Mint111",
            1.0,
            VenueSelection::Explicit("gamma".to_string()),
            fx.all(),
        );
        assert!(matches!(fx.submit(&intent).await, Err(Error::UnknownVenue(_))));
        assert_eq!(fx.alpha.calls() + fx.beta.calls(), 0);
    }

    #[tokio::test]
    async fn test_auto_selection() {
        let fx = Fixture::new(&[Some(2.0)]);

        let fallback = TradeIntent::buy("Mint111", 1.0, VenueSelection::auto(), fx.all());
        fx.submit(&fallback).await.unwrap();
        assert_eq!(fx.beta.buys.load(Ordering::SeqCst), 1);

        let recommended = TradeIntent::buy(
            "Mint111",
            1.0,
            VenueSelection::auto().recommend("alpha"),
            fx.all(),
        );
        fx.submit(&recommended).await.unwrap();
        assert_eq!(fx.alpha.buys.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_wallet_reference() {
        let fx = Fixture::new(&[Some(2.0)]);
        let intent = TradeIntent::buy("Mint111", 1.0, alpha(), vec!["Nope111".to_string()]);
        assert!(matches!(fx.submit(&intent).await, Err(Error::WalletNotFound(_))));
    }

    #[test]
    fn test_invalid_buy_amount() {
        let fx = Fixture::new(&[Some(2.0)]);
        let intent = TradeIntent::buy("Mint111", 0.0, alpha(), fx.all());
        let result = tokio_test::block_on(fx.submit(&intent));
        assert!(matches!(result, Err(Error::InvalidAmount(_))));
    }
}
