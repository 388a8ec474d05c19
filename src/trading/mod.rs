//! Trading module - local signing and submission
//!
//! Every on-chain operation goes through the same three hops:
//! - Builder: public request in, unsigned template out (HTTP)
//! - Signer: local, no I/O
//! - Relay: Jito block engine or plain RPC

pub mod builder;
pub mod operation;
pub mod pipeline;
pub mod relay;
pub mod signer;

#[cfg(test)]
pub(crate) mod mock;

pub use builder::{HttpTemplateBuilder, TemplateBuilder, UnsignedTemplate};
pub use operation::{Amount, BuildRequest, OperationSpec, TradeSide, VenueTrade};
pub use pipeline::{BatchOutcome, OperationOutcome, PipelineStage, SigningPipeline, WalletOutcome};
pub use relay::{relay_from_config, JitoRelay, Relay, RpcRelay};
pub use signer::{sign_template, SignedArtifact};
