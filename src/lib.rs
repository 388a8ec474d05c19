//! Fleet Trader Library
//!
//! Multi-wallet balance tracking and trade execution for Solana tokens.
//! Transactions are built remotely, signed locally and submitted through a
//! relay; secret keys never leave the process.

pub mod balance;
pub mod cli;
pub mod config;
pub mod error;
pub mod router;
pub mod trading;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
