//! Signing and submission pipeline
//!
//! Every source wallet runs its own pass through
//! `Building → Signing → Submitting → Done | Failed`:
//!
//! - Building: public request to the builder, unsigned template back.
//! - Signing: local only; the wallet's secret is borrowed for this step alone.
//! - Submitting: signed artifact to the relay, signature back.
//!
//! A failure at any stage ends that wallet's pass. There are no retries, and
//! the pipeline does not refresh balances; callers re-sync after success.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{Error, FailureKind};
use crate::wallet::Wallet;

use super::builder::TemplateBuilder;
use super::operation::OperationSpec;
use super::relay::Relay;
use super::signer::sign_template;

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Building,
    Signing,
    Submitting,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Building => write!(f, "building"),
            PipelineStage::Signing => write!(f, "signing"),
            PipelineStage::Submitting => write!(f, "submitting"),
            PipelineStage::Done => write!(f, "done"),
            PipelineStage::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one wallet's pass
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Done {
        signature: String,
    },
    Failed {
        /// Stage the pass was in when it failed
        stage: PipelineStage,
        kind: FailureKind,
        error: String,
    },
}

impl OperationOutcome {
    fn failed(stage: PipelineStage, err: &Error) -> Self {
        OperationOutcome::Failed {
            stage,
            kind: err.failure_kind(),
            error: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Done { .. })
    }

    pub fn signature(&self) -> Option<&str> {
        match self {
            OperationOutcome::Done { signature } => Some(signature),
            OperationOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            OperationOutcome::Done { .. } => None,
            OperationOutcome::Failed { error, .. } => Some(error),
        }
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationOutcome::Done { signature } => write!(f, "ok {}", signature),
            OperationOutcome::Failed { stage, kind, error } => {
                write!(f, "failed while {} ({}): {}", stage, kind, error)
            }
        }
    }
}

/// Outcome for one source wallet
#[derive(Debug, Clone, PartialEq)]
pub struct WalletOutcome {
    pub address: String,
    pub outcome: OperationOutcome,
}

/// Per-wallet outcomes of a multi-wallet operation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchOutcome {
    pub outcomes: Vec<WalletOutcome>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> impl Iterator<Item = &WalletOutcome> {
        self.outcomes.iter().filter(|o| o.outcome.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &WalletOutcome> {
        self.outcomes.iter().filter(|o| !o.outcome.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.outcome.is_success())
    }

    /// True when at least one wallet's transaction was accepted
    pub fn any_succeeded(&self) -> bool {
        self.outcomes.iter().any(|o| o.outcome.is_success())
    }

    pub fn get(&self, address: &str) -> Option<&OperationOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.address == address)
            .map(|o| &o.outcome)
    }

    /// One-line summary for the operator
    pub fn summary(&self) -> String {
        let ok = self.succeeded().count();
        let total = self.outcomes.len();
        match (ok, total) {
            (_, 0) => "no wallets processed".to_string(),
            (ok, total) if ok == total => format!("all {} succeeded", total),
            (0, total) => format!("all {} failed", total),
            (ok, total) => format!("{} of {} succeeded, {} failed", ok, total, total - ok),
        }
    }
}

/// Build → sign → submit driver
pub struct SigningPipeline {
    builder: Arc<dyn TemplateBuilder>,
    relay: Arc<dyn Relay>,
}

impl SigningPipeline {
    pub fn new(builder: Arc<dyn TemplateBuilder>, relay: Arc<dyn Relay>) -> Self {
        Self { builder, relay }
    }

    /// Run `op` for each source wallet, one independent pass per wallet.
    ///
    /// Wallets are processed in order, one at a time, so a large consolidate
    /// does not burst the builder or relay.
    pub async fn execute(&self, op: &OperationSpec, wallets: &[&Wallet]) -> BatchOutcome {
        let mut batch = BatchOutcome {
            outcomes: Vec::with_capacity(wallets.len()),
        };

        for wallet in wallets {
            let outcome = self.execute_for(op, wallet).await;
            batch.outcomes.push(WalletOutcome {
                address: wallet.address().to_string(),
                outcome,
            });
        }

        info!("{}: {}", op, batch.summary());
        batch
    }

    /// Run `op` for a single wallet
    pub async fn execute_for(&self, op: &OperationSpec, wallet: &Wallet) -> OperationOutcome {
        let short = wallet.short_address();

        // Building
        debug!("[{}] {}: {}", short, PipelineStage::Building, op);
        let request = op.build_request(wallet.address());
        let template = match self.builder.build(&request).await {
            Ok(template) => template,
            Err(e) => {
                warn!("[{}] builder rejected {}: {}", short, op.action(), e);
                return OperationOutcome::failed(PipelineStage::Building, &e);
            }
        };

        // Signing
        debug!("[{}] {}: {:?}", short, PipelineStage::Signing, template);
        let artifact = match sign_template(&template, wallet.secret()) {
            Ok(artifact) => artifact,
            Err(e) => {
                error!("[{}] signing failed: {}", short, e);
                return OperationOutcome::failed(PipelineStage::Signing, &e);
            }
        };
        drop(template);

        // Submitting
        debug!(
            "[{}] {} via {}: {}",
            short,
            PipelineStage::Submitting,
            self.relay.name(),
            artifact.signature()
        );
        match self.relay.submit(&artifact).await {
            Ok(signature) => {
                info!("[{}] {} submitted: {}", short, op.action(), signature);
                OperationOutcome::Done { signature }
            }
            Err(e) => {
                warn!("[{}] relay {} failed: {}", short, self.relay.name(), e);
                OperationOutcome::failed(PipelineStage::Submitting, &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::AssetId;
    use crate::trading::mock::{MockBuilder, MockRelay};
    use crate::trading::operation::Amount;
    use crate::wallet::SecretKey;
    use solana_sdk::signature::Keypair;

    fn wallet() -> (Wallet, String) {
        let keypair = Keypair::new();
        let encoded = keypair.to_base58_string();
        (Wallet::new("w", SecretKey::from_keypair(keypair), true), encoded)
    }

    fn transfer() -> OperationSpec {
        OperationSpec::Transfer {
            destination: "Dest111".to_string(),
            asset: None,
            amount: Amount::Fixed(0.1),
        }
    }

    #[tokio::test]
    async fn test_done_path() {
        let builder = Arc::new(MockBuilder::valid());
        let relay = Arc::new(MockRelay::accepting("sig1"));
        let pipeline = SigningPipeline::new(builder.clone(), relay.clone());
        let (w, _) = wallet();

        let outcome = pipeline.execute_for(&transfer(), &w).await;
        assert_eq!(
            outcome,
            OperationOutcome::Done {
                signature: "sig1".to_string()
            }
        );
        assert_eq!(builder.calls(), 1);
        assert_eq!(relay.calls(), 1);
    }

    #[tokio::test]
    async fn test_builder_rejection_stops_before_signing() {
        let builder = Arc::new(MockBuilder::rejecting("bad mint"));
        let relay = Arc::new(MockRelay::accepting("sig1"));
        let pipeline = SigningPipeline::new(builder, relay.clone());
        let (w, _) = wallet();

        let outcome = pipeline.execute_for(&transfer(), &w).await;
        match outcome {
            OperationOutcome::Failed { stage, kind, error } => {
                assert_eq!(stage, PipelineStage::Building);
                assert_eq!(kind, FailureKind::Builder);
                assert_eq!(error, "bad mint");
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(relay.calls(), 0);
    }

    #[tokio::test]
    async fn test_bad_template_is_template_failure() {
        let builder = Arc::new(MockBuilder::garbage());
        let relay = Arc::new(MockRelay::accepting("sig1"));
        let pipeline = SigningPipeline::new(builder, relay.clone());
        let (w, _) = wallet();

        let outcome = pipeline.execute_for(&transfer(), &w).await;
        assert!(matches!(
            outcome,
            OperationOutcome::Failed {
                stage: PipelineStage::Signing,
                kind: FailureKind::Template,
                ..
            }
        ));
        assert_eq!(relay.calls(), 0);
    }

    #[tokio::test]
    async fn test_relay_rejection() {
        let pipeline = SigningPipeline::new(
            Arc::new(MockBuilder::valid()),
            Arc::new(MockRelay::rejecting("blockhash not found")),
        );
        let (w, _) = wallet();

        let outcome = pipeline.execute_for(&transfer(), &w).await;
        assert!(matches!(
            outcome,
            OperationOutcome::Failed {
                stage: PipelineStage::Submitting,
                kind: FailureKind::Submission,
                ..
            }
        ));
        assert!(outcome.error().unwrap().contains("blockhash not found"));
    }

    #[tokio::test]
    async fn test_builder_payload_has_no_secret() {
        let builder = Arc::new(MockBuilder::valid());
        let pipeline = SigningPipeline::new(builder.clone(), Arc::new(MockRelay::accepting("s")));
        let (w, secret) = wallet();

        let op = OperationSpec::Burn {
            asset: AssetId::parse("Mint111").unwrap(),
            amount: Amount::Percent(100.0),
        };
        pipeline.execute_for(&op, &w).await;

        let payloads = builder.payloads();
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].contains(w.address()));
        assert!(!payloads[0].contains(&secret));
    }

    #[tokio::test]
    async fn test_partial_failure_is_reported_per_wallet() {
        let (ok_wallet, _) = wallet();
        let (bad_wallet, _) = wallet();
        let builder = Arc::new(MockBuilder::rejecting_for(bad_wallet.address(), "insufficient funds"));
        let pipeline = SigningPipeline::new(builder, Arc::new(MockRelay::accepting("sig")));

        let op = OperationSpec::Consolidate {
            destination: "Vault111".to_string(),
            asset: None,
        };
        let batch = pipeline.execute(&op, &[&ok_wallet, &bad_wallet]).await;

        assert_eq!(batch.outcomes.len(), 2);
        assert!(batch.get(ok_wallet.address()).unwrap().is_success());
        assert_eq!(
            batch.get(bad_wallet.address()).unwrap().error(),
            Some("insufficient funds")
        );
        assert!(!batch.all_succeeded());
        assert!(batch.any_succeeded());
        assert_eq!(batch.summary(), "1 of 2 succeeded, 1 failed");
    }

    #[test]
    fn test_summary_edges() {
        assert_eq!(BatchOutcome::default().summary(), "no wallets processed");
        assert!(!BatchOutcome::default().all_succeeded());
    }
}
