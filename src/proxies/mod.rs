//! Proxied remote controllers.
//!
//! The saved list lives in `config/proxies.json`. Controllers that picked up
//! a DHCP lease from the local dnsmasq are merged into the listing so they
//! can be adopted with a single save.

pub mod host;

use crate::error::{AdminError, Result};
pub use host::is_valid_host;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Description given to leased hosts that are not saved yet.
pub const DHCP_DESCRIPTION: &str = "DHCP";

/// One proxied controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRecord {
    pub host: String,
    #[serde(default)]
    pub description: String,
    /// The host holds a DHCP lease from this controller
    #[serde(default)]
    pub dhcp: bool,
    /// Leased but not in the saved list
    #[serde(default)]
    pub pending: bool,
}

impl ProxyRecord {
    pub fn new(host: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            description: description.into(),
            dhcp: false,
            pending: false,
        }
    }
}

/// On-disk form of a saved proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedProxy {
    host: String,
    #[serde(default)]
    description: String,
}

/// Reads and writes the saved proxy list.
#[derive(Debug, Clone)]
pub struct ProxyStore {
    file: PathBuf,
    leases: PathBuf,
}

impl ProxyStore {
    pub fn new(file: impl Into<PathBuf>, leases: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            leases: leases.into(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Saved proxies followed by leased hosts that are not saved.
    pub fn list(&self) -> Result<Vec<ProxyRecord>> {
        let mut records = self.saved()?;
        let leased = lease_hosts(&self.leases);

        for record in records.iter_mut() {
            record.dhcp = leased.iter().any(|ip| *ip == record.host);
        }
        for ip in leased {
            if !records.iter().any(|r| r.host == ip) {
                records.push(ProxyRecord {
                    host: ip,
                    description: DHCP_DESCRIPTION.to_string(),
                    dhcp: true,
                    pending: true,
                });
            }
        }
        Ok(records)
    }

    /// Replace the saved list. Invalid hosts are dropped and duplicates keep
    /// their first occurrence.
    pub fn replace(&self, records: Vec<ProxyRecord>) -> Result<Vec<ProxyRecord>> {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            let host = record.host.trim().to_string();
            if !is_valid_host(&host) {
                warn!("Dropping invalid proxy host '{}'", record.host);
                continue;
            }
            if !seen.insert(host.clone()) {
                debug!("Dropping duplicate proxy host {}", host);
                continue;
            }
            kept.push(ProxyRecord::new(host, record.description));
        }

        self.save(&kept)?;
        info!("Saved {} proxies", kept.len());
        Ok(kept)
    }

    /// Add one proxy.
    pub fn add(&self, host: &str, description: &str) -> Result<Vec<ProxyRecord>> {
        if !is_valid_host(host) {
            return Err(AdminError::invalid_input(format!(
                "'{}' is neither an IP address nor a hostname",
                host
            )));
        }
        let mut records = self.saved()?;
        if records.iter().any(|r| r.host == host) {
            return Err(AdminError::invalid_input(format!(
                "Proxy {} already exists",
                host
            )));
        }

        records.push(ProxyRecord::new(host, description));
        self.save(&records)?;
        info!("Added proxy {}", host);
        Ok(records)
    }

    /// Remove one proxy.
    pub fn remove(&self, host: &str) -> Result<Vec<ProxyRecord>> {
        let mut records = self.saved()?;
        let before = records.len();
        records.retain(|r| r.host != host);
        if records.len() == before {
            return Err(AdminError::not_found(format!("Proxy {}", host)));
        }

        self.save(&records)?;
        info!("Removed proxy {}", host);
        Ok(records)
    }

    fn saved(&self) -> Result<Vec<ProxyRecord>> {
        if !self.file.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.file)?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let saved: Vec<SavedProxy> = serde_json::from_str(&text)?;
        Ok(saved
            .into_iter()
            .map(|p| ProxyRecord::new(p.host, p.description))
            .collect())
    }

    fn save(&self, records: &[ProxyRecord]) -> Result<()> {
        let saved: Vec<SavedProxy> = records
            .iter()
            .map(|r| SavedProxy {
                host: r.host.clone(),
                description: r.description.clone(),
            })
            .collect();
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.file, serde_json::to_string_pretty(&saved)?)?;
        Ok(())
    }
}

/// Leased addresses from a dnsmasq lease file
/// (`<expiry> <mac> <ip> <hostname> <client-id>`), in file order.
pub fn lease_hosts(leases: &Path) -> Vec<String> {
    let text = match fs::read_to_string(leases) {
        Ok(text) => text,
        Err(e) => {
            debug!("No DHCP leases at {:?}: {}", leases, e);
            return Vec::new();
        }
    };

    let mut hosts: Vec<String> = Vec::new();
    for ip in text.lines().filter_map(|line| line.split_whitespace().nth(2)) {
        if !hosts.iter().any(|h| h == ip) {
            hosts.push(ip.to_string());
        }
    }
    hosts
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ProxyStore {
        ProxyStore::new(
            dir.path().join("config/proxies.json"),
            dir.path().join("dnsmasq.leases"),
        )
    }

    #[test]
    fn test_empty_store() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).list().unwrap().is_empty());
    }

    #[test]
    fn test_replace_validates_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let saved = store
            .replace(vec![
                ProxyRecord::new("10.0.0.5", "Left"),
                ProxyRecord::new("not a host", "Bad"),
                ProxyRecord::new("10.0.0.5", "Again"),
                ProxyRecord::new("tree.local", "Tree"),
            ])
            .unwrap();

        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].description, "Left");
        assert_eq!(store.list().unwrap(), saved);
    }

    #[test]
    fn test_add_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store.add("10.0.0.7", "Arch").unwrap();
        assert!(matches!(
            store.add("10.0.0.7", "Arch"),
            Err(AdminError::InvalidInput(_))
        ));
        assert!(matches!(
            store.add("bad host", ""),
            Err(AdminError::InvalidInput(_))
        ));

        assert!(store.remove("10.0.0.7").unwrap().is_empty());
        assert!(matches!(
            store.remove("10.0.0.7"),
            Err(AdminError::NotFound(_))
        ));
    }

    #[test]
    fn test_dhcp_leases_merge() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.add("192.168.7.20", "Garage").unwrap();
        fs::write(
            dir.path().join("dnsmasq.leases"),
            "1700000000 aa:bb:cc:dd:ee:01 192.168.7.20 garage 01:aa\n\
             1700000000 aa:bb:cc:dd:ee:02 192.168.7.21 porch 01:ab\n",
        )
        .unwrap();

        let records = store.list().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].dhcp);
        assert!(!records[0].pending);
        assert_eq!(records[0].description, "Garage");
        assert_eq!(
            records[1],
            ProxyRecord {
                host: "192.168.7.21".to_string(),
                description: DHCP_DESCRIPTION.to_string(),
                dhcp: true,
                pending: true,
            }
        );
    }
}
