//! Secret key handling
//!
//! `SecretKey` owns a wallet's signing keypair. It is not `Serialize` or
//! `Clone` and its `Debug` output is redacted. The keypair is only reachable
//! through [`SecretKey::with_keypair`], which lends it for one closure call.

use std::fmt;
use std::path::Path;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;

use crate::error::{Error, Result};

/// Wallet signing key, scoped to single signing calls
pub struct SecretKey {
    keypair: Keypair,
}

impl SecretKey {
    /// Wrap an existing keypair
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Parse a 64-byte secret key encoded as base58 (Phantom/Solflare export format)
    pub fn from_base58(encoded: &str) -> Result<Self> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| Error::InvalidKeypair(format!("Invalid base58 secret: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Parse raw 64-byte secret key material
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let keypair = Keypair::from_bytes(bytes)
            .map_err(|e| Error::InvalidKeypair(format!("Invalid keypair bytes: {}", e)))?;
        Ok(Self { keypair })
    }

    /// Load a Solana CLI keypair file (JSON array of bytes)
    pub fn from_keypair_file(path: &Path) -> Result<Self> {
        let keypair_data = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidKeypair(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let secret_key: Vec<u8> = serde_json::from_str(&keypair_data).map_err(|e| {
            Error::InvalidKeypair(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Self::from_bytes(&secret_key)
    }

    /// Public key of this secret
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Lend the keypair to `f` for one call.
    ///
    /// Only the signer uses this. The borrow cannot outlive the closure.
    pub(crate) fn with_keypair<R>(&self, f: impl FnOnce(&Keypair) -> R) -> R {
        f(&self.keypair)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("pubkey", &self.keypair.pubkey())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_debug_is_redacted() {
        let keypair = Keypair::new();
        let encoded = keypair.to_base58_string();
        let secret = SecretKey::from_keypair(keypair);

        let debug = format!("{:?}", secret);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&encoded));
    }

    #[test]
    fn test_base58_roundtrip_keeps_pubkey() {
        let keypair = Keypair::new();
        let pubkey = keypair.pubkey();
        let secret = SecretKey::from_base58(&keypair.to_base58_string()).unwrap();
        assert_eq!(secret.pubkey(), pubkey);
    }

    #[test]
    fn test_rejects_short_secret() {
        assert!(SecretKey::from_bytes(&[1u8; 10]).is_err());
        assert!(SecretKey::from_base58("not-base58-0OIl").is_err());
    }

    #[test]
    fn test_keypair_file() {
        let keypair = Keypair::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{:?}", keypair.to_bytes().to_vec()).unwrap();

        let secret = SecretKey::from_keypair_file(file.path()).unwrap();
        assert_eq!(secret.pubkey(), keypair.pubkey());
    }
}
