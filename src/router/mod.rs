//! Trade routing
//!
//! ```text
//! TradeIntent → ExecutionRouter::validate → VenueRegistry → VenueExecutor → SigningPipeline
//! ```

pub mod execution;
pub mod intent;
pub mod venue;

pub use execution::ExecutionRouter;
pub use intent::{TradeIntent, TradeMode, VenueSelection};
pub use venue::{PipelineVenue, VenueDescriptor, VenueExecutor, VenueRegistry};
