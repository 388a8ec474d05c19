//! Local template signing
//!
//! Decodes a builder template into a `VersionedTransaction`, adds the wallet's
//! signature at its signer slot and re-encodes the result. No network I/O.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use solana_sdk::signature::Signature;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::VersionedTransaction;
use tracing::debug;

use crate::error::{Error, Result};
use crate::wallet::SecretKey;

use super::builder::UnsignedTemplate;

/// Signed, wire-encoded transaction ready for the relay
#[derive(Debug, Clone)]
pub struct SignedArtifact {
    transaction: VersionedTransaction,
    encoded: String,
    signature: Signature,
}

impl SignedArtifact {
    /// Signature added by this wallet; also the transaction id once landed
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Base64 of the bincode-serialized transaction
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn transaction(&self) -> &VersionedTransaction {
        &self.transaction
    }
}

/// Decode and sanity-check a template
pub fn decode_template(template: &UnsignedTemplate) -> Result<VersionedTransaction> {
    let transaction: VersionedTransaction = bincode::deserialize(template.as_bytes())
        .map_err(|e| Error::Template(format!("Failed to decode transaction: {}", e)))?;

    let required = transaction.message.header().num_required_signatures as usize;
    let keys = transaction.message.static_account_keys().len();
    if required == 0 || required > keys {
        return Err(Error::Template(format!(
            "Template requires {} signatures but lists {} accounts",
            required, keys
        )));
    }

    Ok(transaction)
}

/// Sign a template with `secret`.
///
/// Signatures the builder already placed for other signers are kept.
pub fn sign_template(template: &UnsignedTemplate, secret: &SecretKey) -> Result<SignedArtifact> {
    let mut transaction = decode_template(template)?;

    let signer = secret.pubkey();
    let required = transaction.message.header().num_required_signatures as usize;
    let slot = transaction.message.static_account_keys()[..required]
        .iter()
        .position(|key| *key == signer)
        .ok_or_else(|| {
            Error::Signing(format!("{} is not a required signer of the template", signer))
        })?;

    let message_bytes = transaction.message.serialize();
    let signature = secret.with_keypair(|keypair| keypair.sign_message(&message_bytes));

    transaction
        .signatures
        .resize(required, Signature::default());
    transaction.signatures[slot] = signature;

    let bytes = bincode::serialize(&transaction)
        .map_err(|e| Error::Serialization(format!("Failed to encode transaction: {}", e)))?;

    debug!("Signed template for {} at slot {}", signer, slot);

    Ok(SignedArtifact {
        transaction,
        encoded: STANDARD.encode(bytes),
        signature,
    })
}
