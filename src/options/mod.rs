//! Setting-name keyed option lists for the settings UI.
//!
//! Each setting produces either an ordered label → value map, a plain list or
//! a raw JSON value. Failures never surface as errors: the setting simply has
//! no choices and the cause is logged.

pub mod audio;
pub mod pins;
pub mod runner;
pub mod system;
pub mod video;

use crate::config::AdminConfig;
use crate::error::{AdminError, Result};
use crate::gpio::PinInventory;
use pins::PinFilter;
use runner::{CommandRunner, SystemRunner};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Label → value pairs in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyedOptions {
    entries: Vec<(String, String)>,
}

impl KeyedOptions {
    /// Insert a choice. An existing label keeps its position and takes the
    /// new value.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        let label = label.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.entries.iter()
    }
}

impl Serialize for KeyedOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// The choices for one setting.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum OptionList {
    Keyed(KeyedOptions),
    List(Vec<String>),
    Records(Vec<Value>),
    Raw(Value),
}

impl OptionList {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Keyed(options) => options.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Records(records) => records.is_empty(),
            Self::Raw(value) => value.is_null(),
        }
    }
}

/// Shape returned for a setting when enumeration fails.
fn empty_for(setting: &str) -> OptionList {
    match setting {
        "AudioOutputList" | "AudioInputList" | "AudioInputListAllowMedia" | "TimeZone" => {
            OptionList::List(Vec::new())
        }
        "GPIOS" => OptionList::Records(Vec::new()),
        _ => OptionList::Keyed(KeyedOptions::default()),
    }
}

/// Settings answered from host programs and files.
fn host_options(
    config: &AdminConfig,
    runner: &dyn CommandRunner,
    setting: &str,
) -> Result<Option<OptionList>> {
    let options = match setting {
        "AudioMixerDevice" => {
            let card = audio::current_card(&config.asound_rc);
            OptionList::Keyed(audio::mixer_devices(runner, &card)?)
        }
        "AudioOutput" => {
            let card = audio::current_card(&config.asound_rc);
            OptionList::Keyed(audio::playback_options(runner, &card)?)
        }
        "AudioInput" => OptionList::Keyed(audio::capture_options(runner)?),
        "AudioOutputList" => OptionList::List(audio::device_list(runner, audio::PLAYBACK_PROGRAM)?),
        "AudioInputList" => OptionList::List(audio::device_list(runner, audio::CAPTURE_PROGRAM)?),
        "AudioInputListAllowMedia" => {
            let mut inputs = vec![audio::PLAYING_MEDIA.to_string()];
            inputs.extend(audio::device_list(runner, audio::CAPTURE_PROGRAM)?);
            OptionList::List(inputs)
        }
        "FrameBuffer" => OptionList::Raw(frame_buffers(config, runner)?),
        "BBBLeds" => OptionList::Keyed(system::bbb_led_options(&config.platform)),
        "Locale" => OptionList::Keyed(system::locales(&config.locale_dir())?),
        "RTC" => OptionList::Keyed(system::rtc_options()),
        "TimeZone" => OptionList::List(system::timezones(&config.zoneinfo_dir)),
        _ => return Ok(None),
    };
    Ok(Some(options))
}

/// First line of the player's frame-buffer query, as JSON.
fn frame_buffers(config: &AdminConfig, runner: &dyn CommandRunner) -> Result<Value> {
    let binary = config.player_binary();
    let lines = runner.run(&binary.to_string_lossy(), &["-FB"])?;
    let first = lines
        .first()
        .ok_or_else(|| AdminError::parse_error("player printed no frame buffers"))?;
    Ok(serde_json::from_str(first)?)
}

/// Builds option lists from the host, the pin inventory and the player.
pub struct OptionsProvider {
    config: Arc<AdminConfig>,
    runner: Arc<dyn CommandRunner>,
    inventory: Arc<dyn PinInventory>,
    http: reqwest::Client,
}

impl OptionsProvider {
    pub fn new(config: Arc<AdminConfig>, inventory: Arc<dyn PinInventory>) -> Result<Self> {
        Self::with_runner(config, inventory, Arc::new(SystemRunner))
    }

    /// Use a custom command runner.
    pub fn with_runner(
        config: Arc<AdminConfig>,
        inventory: Arc<dyn PinInventory>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(video::MODELS_CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            config,
            runner,
            inventory,
            http,
        })
    }

    /// Choices for `setting`. Unknown settings have none.
    pub async fn get(&self, setting: &str) -> OptionList {
        debug!("Enumerating options for {}", setting);
        match self.enumerate(setting).await {
            Ok(Some(options)) => options,
            Ok(None) => {
                debug!("Unknown option setting {}", setting);
                OptionList::Keyed(KeyedOptions::default())
            }
            Err(e) => {
                warn!("Failed to enumerate {}: {}", setting, e);
                empty_for(setting)
            }
        }
    }

    async fn enumerate(&self, setting: &str) -> Result<Option<OptionList>> {
        let options = match setting {
            "VideoOutput" => OptionList::Keyed(self.video_outputs(false).await?),
            "PlaylistVideoOutput" => OptionList::Keyed(self.video_outputs(true).await?),
            "GPIOS" => {
                let records = self.inventory.fetch_raw().await?;
                OptionList::Records(pins::visible_records(records, &self.pin_filter()?))
            }
            "GPIOLIST" => {
                let records = self.inventory.fetch_raw().await?;
                OptionList::Keyed(pins::pin_labels(&records, &self.pin_filter()?))
            }
            _ => {
                // Host programs and directory walks block.
                let config = self.config.clone();
                let runner = self.runner.clone();
                let setting = setting.to_string();
                return tokio::task::spawn_blocking(move || {
                    host_options(&config, runner.as_ref(), &setting)
                })
                .await
                .map_err(|e| AdminError::command_error(format!("Option task failed: {}", e)))?;
            }
        };
        Ok(Some(options))
    }

    async fn video_outputs(&self, playlist: bool) -> Result<KeyedOptions> {
        let drm_dir = self.config.drm_dir.clone();
        let connectors = tokio::task::spawn_blocking(move || video::drm_connectors(&drm_dir))
            .await
            .map_err(|e| AdminError::command_error(format!("Connector task failed: {}", e)))?
            .unwrap_or_else(|e| {
                debug!("No DRM connectors: {}", e);
                Vec::new()
            });
        let models = video::fetch_models(&self.http, &self.config.models_url)
            .await
            .unwrap_or_default();
        Ok(video::video_outputs(&connectors, &models, playlist))
    }

    fn pin_filter(&self) -> Result<PinFilter> {
        if self.config.show_all_options {
            return Ok(PinFilter::default());
        }
        PinFilter::new(
            &self.config.gpio_show_filters,
            &self.config.gpio_hide_filters,
        )
    }
}
