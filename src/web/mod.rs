//! Admin HTTP API.
//!
//! Every request recomputes its answer from the current files and the pin
//! inventory. The only shared mutable state is the proxy list, whose writes
//! are serialized by a lock.

pub mod config;
pub mod handlers;
pub mod router;

pub use config::WebConfig;
pub use router::create_app;

use crate::config::AdminConfig;
use crate::error::{AdminError, Result};
use crate::gpio::{HttpInventory, PinInventory};
use crate::options::OptionsProvider;
use crate::proxies::ProxyStore;
use crate::storage::DiskUsage;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AdminConfig>,
    pub inventory: Arc<dyn PinInventory>,
    pub options: Arc<OptionsProvider>,
    pub proxies: Arc<Mutex<ProxyStore>>,
    /// Fixed disk usage; probed per request when `None`
    pub disk_usage: Option<DiskUsage>,
    pub(crate) static_path: Option<PathBuf>,
}

impl AppState {
    /// State backed by the HTTP pin inventory named in `config`.
    pub fn new(config: AdminConfig) -> Result<Self> {
        let inventory = Arc::new(HttpInventory::new(config.inventory_url.clone())?);
        Self::with_inventory(config, inventory)
    }

    pub fn with_inventory(config: AdminConfig, inventory: Arc<dyn PinInventory>) -> Result<Self> {
        let config = Arc::new(config);
        let options = OptionsProvider::new(config.clone(), inventory.clone())?;
        Ok(Self::from_parts(config, inventory, options))
    }

    /// Assemble from prebuilt parts.
    pub fn from_parts(
        config: Arc<AdminConfig>,
        inventory: Arc<dyn PinInventory>,
        options: OptionsProvider,
    ) -> Self {
        let proxies = ProxyStore::new(config.proxies_file(), config.dhcp_leases.clone());
        Self {
            config,
            inventory,
            options: Arc::new(options),
            proxies: Arc::new(Mutex::new(proxies)),
            disk_usage: None,
            static_path: None,
        }
    }

    pub fn with_disk_usage(mut self, usage: DiskUsage) -> Self {
        self.disk_usage = Some(usage);
        self
    }
}

/// Bind and serve until the process stops.
pub async fn start_web_server(config: WebConfig, state: AppState) -> Result<()> {
    let app = create_app(&config, state);

    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| AdminError::config_error(format!("Invalid bind address: {}", e)))?;

    info!("Starting admin API on http://{}", addr);
    info!("GPIO report: http://{}/api/gpio/config", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AdminError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AdminError::web_server_error(format!("Server error: {}", e)))?;

    Ok(())
}
