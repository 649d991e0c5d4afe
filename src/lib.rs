//! # show_admin - Show Controller Admin API
//!
//! Admin backend for a lighting and media show controller. It reports how
//! the controller's GPIO pins are used across every configuration file,
//! enumerates choices for hardware settings, manages the list of proxied
//! remote controllers and inspects storage devices.
//!
//! ## Features
//!
//! - **GPIO usage report**: pin inventory annotated with every configured
//!   input, output and cape claim, with conflicts flagged
//! - **Setting options**: audio cards, video outputs, locales, timezones, pins
//! - **Proxy list**: saved controllers merged with DHCP leases
//! - **Storage inspection**: candidate media devices and maintenance actions
//! - **Live pin levels**: read on a Raspberry Pi with the `gpio` feature
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use show_admin::{gpio_config, AdminConfig, HttpInventory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AdminConfig::load(None)?;
//!     let inventory = HttpInventory::new(config.inventory_url.clone())?;
//!
//!     for pin in gpio_config(&inventory, config.aggregator_config()).await? {
//!         if pin.config_error {
//!             println!("{}: {:?}", pin.pin, pin.config_conflict.render());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gpio;
pub mod options;
pub mod proxies;
pub mod storage;
pub mod web;

// Re-export public API
pub use config::AdminConfig;
pub use error::{AdminError, Result};
pub use gpio::{
    gpio_config, AggregatorConfig, ConflictLog, GpioAggregator, HttpInventory, PinInventory,
    PinRecord, SourceKind, StaticInventory,
};
pub use options::{KeyedOptions, OptionList, OptionsProvider};
pub use proxies::{ProxyRecord, ProxyStore};
pub use storage::{StorageActions, StorageInspector, StorageReport};
pub use web::{start_web_server, AppState, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8080;
