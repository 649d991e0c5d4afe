//! Appliance settings shared by every API module.
//!
//! The settings are normally loaded once at startup from a TOML file and then
//! handed to each subsystem explicitly; nothing reads them from global state.

use crate::error::{AdminError, Result};
use crate::gpio::{AggregatorConfig, SourceKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Platform name reported by Raspberry Pi appliances.
pub const PLATFORM_RASPBERRY_PI: &str = "Raspberry Pi";

/// Platform name reported by 32-bit BeagleBone appliances.
pub const PLATFORM_BEAGLEBONE_BLACK: &str = "BeagleBone Black";

/// Platform name reported by 64-bit BeagleBone appliances.
pub const PLATFORM_BEAGLEBONE_64: &str = "BeagleBone 64";

/// Process-wide appliance settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Hardware platform, e.g. "Raspberry Pi"
    pub platform: String,
    /// Board variant, e.g. "Raspberry Pi 4"
    pub sub_platform: String,
    /// Display name of the installed cape/hat
    pub cape_name: Option<String>,
    /// Media directory holding `config/` and `tmp/`
    pub media_dir: PathBuf,
    /// Installation directory of the player
    pub app_dir: PathBuf,
    /// Pin inventory endpoint
    pub inventory_url: String,
    /// Pixel overlay model endpoint
    pub models_url: String,
    /// ALSA rc file holding the selected card
    pub asound_rc: PathBuf,
    /// Timezone database root
    pub zoneinfo_dir: PathBuf,
    /// DRM connector class directory
    pub drm_dir: PathBuf,
    /// Block device class directory
    pub block_dir: PathBuf,
    /// Device node directory
    pub dev_dir: PathBuf,
    /// Static filesystem table
    pub fstab: PathBuf,
    /// Mount table of the running system
    pub mounts: PathBuf,
    /// dnsmasq lease file used for DHCP proxy discovery
    pub dhcp_leases: PathBuf,
    /// Disable cape show/hide filtering of option lists
    pub show_all_options: bool,
    /// Cape provided include filters for GPIO option lists
    pub gpio_show_filters: Vec<String>,
    /// Cape provided exclude filters for GPIO option lists
    pub gpio_hide_filters: Vec<String>,
    /// Last block of the SD card partition table, if known
    pub last_block: Option<u64>,
    /// GPIO configuration sources to consult
    pub enabled_sources: Vec<SourceKind>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            platform: PLATFORM_RASPBERRY_PI.to_string(),
            sub_platform: String::new(),
            cape_name: None,
            media_dir: PathBuf::from("/home/fpp/media"),
            app_dir: PathBuf::from("/opt/fpp"),
            inventory_url: "http://127.0.0.1:32322/gpio".to_string(),
            models_url: "http://127.0.0.1:32322/models".to_string(),
            asound_rc: PathBuf::from("/root/.asoundrc"),
            zoneinfo_dir: PathBuf::from("/usr/share/zoneinfo"),
            drm_dir: PathBuf::from("/sys/class/drm"),
            block_dir: PathBuf::from("/sys/class/block"),
            dev_dir: PathBuf::from("/dev"),
            fstab: PathBuf::from("/etc/fstab"),
            mounts: PathBuf::from("/proc/mounts"),
            dhcp_leases: PathBuf::from("/var/lib/misc/dnsmasq.leases"),
            show_all_options: false,
            gpio_show_filters: Vec::new(),
            gpio_hide_filters: Vec::new(),
            last_block: None,
            enabled_sources: SourceKind::ALL.to_vec(),
        }
    }
}

impl AdminConfig {
    /// Load settings from a TOML file, falling back to defaults when no
    /// file is given or the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("No settings file given, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            info!("Settings file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| AdminError::config_error(format!("Invalid settings file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work at all.
    pub fn validate(&self) -> Result<()> {
        if self.platform.trim().is_empty() {
            return Err(AdminError::config_error("platform must not be empty"));
        }
        if self.inventory_url.trim().is_empty() {
            return Err(AdminError::config_error("inventory_url must not be empty"));
        }
        for filter in self.gpio_show_filters.iter().chain(&self.gpio_hide_filters) {
            regex::Regex::new(filter).map_err(|e| {
                AdminError::config_error(format!("Invalid GPIO filter '{}': {}", filter, e))
            })?;
        }
        Ok(())
    }

    /// Directory with user-edited configuration documents.
    pub fn config_dir(&self) -> PathBuf {
        self.media_dir.join("config")
    }

    /// Directory with documents generated at boot (cape definitions).
    pub fn tmp_dir(&self) -> PathBuf {
        self.media_dir.join("tmp")
    }

    /// File holding the saved proxy list.
    pub fn proxies_file(&self) -> PathBuf {
        self.config_dir().join("proxies.json")
    }

    /// Directory holding locale definitions.
    pub fn locale_dir(&self) -> PathBuf {
        self.app_dir.join("etc").join("locale")
    }

    /// Player binary used for frame buffer queries.
    pub fn player_binary(&self) -> PathBuf {
        self.app_dir.join("src").join("fpp")
    }

    /// Build the aggregator settings for one GPIO report.
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig::new(self.platform.clone())
            .with_cape_name(self.cape_name.clone())
            .with_dirs(self.config_dir(), self.tmp_dir())
            .with_sources(self.enabled_sources.clone())
    }
}
