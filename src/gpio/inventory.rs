//! Sources of the raw pin list.

use crate::error::{AdminError, Result};
use crate::gpio::data::PinRecord;
use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Provides the list of pins the hardware exposes.
#[async_trait]
pub trait PinInventory: Send + Sync {
    /// Fetch the inventory records exactly as the source reports them.
    async fn fetch_raw(&self) -> Result<Vec<Value>>;

    /// Fetch the inventory as pin records with unclaimed usage fields.
    async fn fetch_pins(&self) -> Result<Vec<PinRecord>> {
        self.fetch_raw()
            .await?
            .into_iter()
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| AdminError::parse_error(format!("Invalid pin record: {}", e)))
            })
            .collect()
    }
}

/// Inventory served by the player daemon over HTTP.
pub struct HttpInventory {
    client: reqwest::Client,
    url: String,
}

impl HttpInventory {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PinInventory for HttpInventory {
    async fn fetch_raw(&self) -> Result<Vec<Value>> {
        debug!("Fetching pin inventory from {}", self.url);
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AdminError::network_error(format!("Pin inventory unreachable: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AdminError::network_error(format!(
                "Pin inventory returned HTTP {}",
                resp.status()
            )));
        }

        Ok(resp.json().await?)
    }
}

/// Fixed inventory, loaded from a file or built in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    records: Vec<Value>,
}

impl StaticInventory {
    pub fn new(records: Vec<Value>) -> Self {
        Self { records }
    }

    /// Build from pin records.
    pub fn from_pins(pins: &[PinRecord]) -> Result<Self> {
        let records = pins
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { records })
    }

    /// Load a saved copy of the inventory JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let records: Vec<Value> = serde_json::from_str(&text)?;
        Ok(Self { records })
    }
}

#[async_trait]
impl PinInventory for StaticInventory {
    async fn fetch_raw(&self) -> Result<Vec<Value>> {
        Ok(self.records.clone())
    }
}
