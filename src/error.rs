//! Error types for the fleet trader

use solana_client::client_error::{ClientError, ClientErrorKind};
use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the fleet trader
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    // Balance data source errors
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("RPC timeout after {0}ms")]
    RpcTimeout(u64),

    #[error("RPC connection failed: {0}")]
    RpcConnection(String),

    #[error("Balance source unreachable: {0}")]
    BalanceSourceUnavailable(String),

    // Pipeline errors
    #[error("{0}")]
    BuilderRejected(String),

    #[error("Builder request failed: {0}")]
    BuilderRequest(String),

    #[error("Invalid transaction template: {0}")]
    Template(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Relay submission failed: {0}")]
    Submission(String),

    #[error("Relay rejected transaction: {0}")]
    RelayRejected(String),

    // Router validation errors
    #[error("No active wallets selected")]
    NoActiveWallets,

    #[error("Token reference is empty")]
    EmptyToken,

    #[error("Insufficient balance in {address}: {available}SOL available, {required}SOL required")]
    InsufficientBalance {
        address: String,
        available: f64,
        required: f64,
    },

    #[error("Balance unknown for wallet {0}, refresh balances first")]
    BalanceUnknown(String),

    #[error("Sell percentage must be in (0, 100], got {0}")]
    InvalidPercent(f64),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown venue: {0}")]
    UnknownVenue(String),

    #[error("Duplicate venue id: {0}")]
    DuplicateVenue(String),

    #[error("Unsupported trade mode: {0}")]
    UnsupportedMode(String),

    // Wallet management errors
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Coarse failure class reported in operation outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected before any network call
    Validation,
    /// Builder refused or could not produce a template
    Builder,
    /// Template could not be decoded or signed
    Template,
    /// Relay refused or could not be reached
    Submission,
    /// Anything else
    Internal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Validation => write!(f, "validation"),
            FailureKind::Builder => write!(f, "builder"),
            FailureKind::Template => write!(f, "template"),
            FailureKind::Submission => write!(f, "submission"),
            FailureKind::Internal => write!(f, "internal"),
        }
    }
}

impl Error {
    /// Check if this error comes from an unreachable or failing network peer
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Error::RpcTimeout(_)
                | Error::RpcConnection(_)
                | Error::BalanceSourceUnavailable(_)
                | Error::BuilderRequest(_)
                | Error::Submission(_)
        )
    }

    /// Check if the balance source itself could not be reached.
    ///
    /// Error replies and malformed responses prove the source is up, so
    /// only transport failures count.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::RpcTimeout(_) | Error::RpcConnection(_))
    }

    /// Check if this error was raised by router validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::NoActiveWallets
                | Error::EmptyToken
                | Error::InsufficientBalance { .. }
                | Error::BalanceUnknown(_)
                | Error::InvalidPercent(_)
                | Error::InvalidAmount(_)
                | Error::UnknownVenue(_)
                | Error::UnsupportedMode(_)
                | Error::WalletNotFound(_)
        )
    }

    /// Map this error onto the outcome failure class
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            e if e.is_validation() => FailureKind::Validation,
            Error::BuilderRejected(_) | Error::BuilderRequest(_) => FailureKind::Builder,
            Error::Template(_) | Error::Signing(_) => FailureKind::Template,
            Error::Submission(_) | Error::RelayRejected(_) => FailureKind::Submission,
            _ => FailureKind::Internal,
        }
    }
}

// Conversion from solana_client errors
impl From<ClientError> for Error {
    fn from(e: ClientError) -> Self {
        match e.kind() {
            ClientErrorKind::Reqwest(_) | ClientErrorKind::Io(_) => {
                Error::RpcConnection(e.to_string())
            }
            _ => Error::Rpc(e.to_string()),
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
