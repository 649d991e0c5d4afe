//! GPIO pin usage reporting.
//!
//! Merges what every configuration source says about the pins into one
//! annotated pin list, flagging pins that more than one subsystem claims.

pub mod aggregator;
pub mod data;
pub mod inventory;
pub mod levels;
pub mod sources;

// Re-export commonly used items
pub use aggregator::{gpio_config, AggregatorConfig, GpioAggregator};
pub use data::{Claim, ConflictEntry, ConflictLog, PinLocator, PinRecord, AVAILABLE};
pub use inventory::{HttpInventory, PinInventory, StaticInventory};
pub use sources::{ConfigDocuments, SourceKind};
