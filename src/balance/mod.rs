//! Fleet balance synchronization
//!
//! ```text
//! WalletStore → BalanceSynchronizer → BalanceSnapshot → SyncCoordinator
//!                      ↑                                      ↓
//!                BalanceSource                         ExecutionRouter
//! ```

pub mod snapshot;
pub mod source;
pub mod sync;

pub use snapshot::{AssetId, BalanceSnapshot, BalanceState};
pub use source::{BalanceSource, RpcBalanceSource};
pub use sync::{BalanceSynchronizer, SyncCoordinator, SyncTicket, SyncTrigger, DEFAULT_BATCH_SIZE};
