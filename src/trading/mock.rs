//! In-memory builder and relay for tests

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use solana_sdk::message::{Message, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;

use crate::error::{Error, Result};

use super::builder::{TemplateBuilder, UnsignedTemplate};
use super::operation::BuildRequest;
use super::relay::Relay;
use super::signer::SignedArtifact;

enum BuilderMode {
    Valid,
    Reject(String),
    RejectFor(String, String),
    Garbage,
}

/// Builder producing a transfer template paid by the requesting wallet
pub struct MockBuilder {
    mode: BuilderMode,
    calls: AtomicUsize,
    payloads: Mutex<Vec<String>>,
}

impl MockBuilder {
    fn with_mode(mode: BuilderMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn valid() -> Self {
        Self::with_mode(BuilderMode::Valid)
    }

    pub fn rejecting(message: &str) -> Self {
        Self::with_mode(BuilderMode::Reject(message.to_string()))
    }

    /// Reject only requests from `address`
    pub fn rejecting_for(address: &str, message: &str) -> Self {
        Self::with_mode(BuilderMode::RejectFor(
            address.to_string(),
            message.to_string(),
        ))
    }

    /// Return bytes that do not decode as a transaction
    pub fn garbage() -> Self {
        Self::with_mode(BuilderMode::Garbage)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Serialized request bodies, in call order
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemplateBuilder for MockBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<UnsignedTemplate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads
            .lock()
            .unwrap()
            .push(serde_json::to_string(request)?);

        match &self.mode {
            BuilderMode::Reject(message) => return Err(Error::BuilderRejected(message.clone())),
            BuilderMode::RejectFor(address, message) if *address == request.public_key => {
                return Err(Error::BuilderRejected(message.clone()))
            }
            BuilderMode::Garbage => return Ok(UnsignedTemplate::from_bytes(vec![7, 7, 7])),
            _ => {}
        }

        let payer = Pubkey::from_str(&request.public_key)
            .map_err(|e| Error::InvalidAddress(e.to_string()))?;
        let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 1_000);
        let tx = VersionedTransaction {
            signatures: vec![],
            message: VersionedMessage::Legacy(Message::new(&[ix], Some(&payer))),
        };
        let bytes = bincode::serialize(&tx).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(UnsignedTemplate::from_bytes(bytes))
    }
}

/// Relay that answers every submission the same way
pub struct MockRelay {
    answer: std::result::Result<String, String>,
    calls: AtomicUsize,
}

impl MockRelay {
    pub fn accepting(signature: &str) -> Self {
        Self {
            answer: Ok(signature.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Relay for MockRelay {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn submit(&self, _artifact: &SignedArtifact) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone().map_err(Error::RelayRejected)
    }
}
