//! Wallet management module
//!
//! The wallet store is owned by the operator's session; the rest of the crate
//! only reads it. Secret keys stay inside [`SecretKey`] and are lent to the
//! signer one call at a time.

pub mod secret;
pub mod store;

pub use secret::SecretKey;
pub use store::{Wallet, WalletEntry, WalletRegistry, WalletStore};
