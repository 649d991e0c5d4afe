//! Parsing adapters for the configuration documents that claim pins.
//!
//! Every document is optional. A missing file is skipped quietly, a file that
//! cannot be read or parsed is skipped with a warning, and nothing from a
//! broken document is ever applied.

use crate::gpio::data::PinLocator;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directly configured GPIO inputs.
pub const GPIO_INPUTS_FILE: &str = "gpio.json";
/// Miscellaneous channel outputs, including plain GPIO outputs.
pub const CHANNEL_OUTPUTS_FILE: &str = "co-other.json";
/// Cape/hat hardwired inputs, generated at boot into the tmp dir. Older
/// installs keep it in the config dir.
pub const CAPE_INPUTS_FILE: &str = "cape-inputs.json";
/// PWM channel outputs.
pub const PWM_OUTPUTS_FILE: &str = "co-pwm.json";
/// Pixel string channel outputs.
pub const STRING_OUTPUTS_FILES: [&str; 2] = ["co-pixelStrings.json", "co-bbbStrings.json"];
/// Subdirectory of the tmp dir holding PWM cape definitions.
pub const PWM_DEFINITIONS_DIR: &str = "pwm";
/// Subdirectory of the tmp dir holding string cape definitions.
pub const STRING_DEFINITIONS_DIR: &str = "strings";

/// The claim passes, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    PlatformDefaults,
    GpioInputs,
    ChannelOutputs,
    CapeInputs,
    CapeInputActions,
    CapePwm,
    CapeStrings,
}

impl SourceKind {
    /// Every source in priority order. Later sources win the labels.
    pub const ALL: [SourceKind; 7] = [
        SourceKind::PlatformDefaults,
        SourceKind::GpioInputs,
        SourceKind::ChannelOutputs,
        SourceKind::CapeInputs,
        SourceKind::CapeInputActions,
        SourceKind::CapePwm,
        SourceKind::CapeStrings,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::PlatformDefaults => "platform defaults",
            SourceKind::GpioInputs => "GPIO inputs",
            SourceKind::ChannelOutputs => "channel outputs",
            SourceKind::CapeInputs => "cape inputs",
            SourceKind::CapeInputActions => "cape input actions",
            SourceKind::CapePwm => "cape PWM outputs",
            SourceKind::CapeStrings => "cape string outputs",
        }
    }
}

/// Accept `true`/`false`, numbers and numeric strings as an enabled flag.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "yes"),
        _ => false,
    })
}

/// Entry of `gpio.json`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GpioInputEntry {
    pub pin: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub enabled: bool,
    #[serde(default)]
    pub desc: String,
}

/// A `gpio` field that is either a pin name or a legacy GPIO number.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum GpioRef {
    Number(u32),
    Name(String),
}

impl GpioRef {
    pub fn locator(&self) -> PinLocator {
        match self {
            GpioRef::Number(n) => PinLocator::Legacy(*n),
            GpioRef::Name(name) => PinLocator::Name(name.clone()),
        }
    }
}

/// Entry of a `co-*.json` channel output document.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOutputEntry {
    #[serde(rename = "type", default)]
    pub output_type: String,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub enabled: bool,
    #[serde(default)]
    pub gpio: Option<GpioRef>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sub_type: Option<String>,
}

/// A `co-*.json` channel output document.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChannelOutputDocument {
    #[serde(rename = "channelOutputs", default)]
    pub channel_outputs: Vec<ChannelOutputEntry>,
}

/// One line of an I/O expander behind a cape input.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CapeInputAction {
    pub line: u32,
    #[serde(default)]
    pub label: Option<String>,
}

/// Entry of `cape-inputs.json`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CapeInputEntry {
    #[serde(rename = "type", default)]
    pub input_type: String,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub gpio: Option<u32>,
    #[serde(default)]
    pub chip: Option<String>,
    #[serde(default)]
    pub actions: Vec<CapeInputAction>,
}

impl CapeInputEntry {
    pub fn is_gpiod(&self) -> bool {
        self.input_type == "gpiod"
    }

    /// Pin name first. A line number is addressed on `chip` when that names
    /// a GPIO chip (`gpiochip2` or `2`), as a legacy number otherwise.
    pub fn locator(&self) -> Option<PinLocator> {
        if let Some(pin) = self.pin.as_deref().filter(|p| !p.is_empty()) {
            return Some(PinLocator::Name(pin.to_string()));
        }
        let line = self.gpio?;
        Some(match self.chip_number() {
            Some(chip) => PinLocator::Line { chip, line },
            None => PinLocator::Legacy(line),
        })
    }

    fn chip_number(&self) -> Option<u32> {
        let chip = self.chip.as_deref()?;
        chip.strip_prefix("gpiochip").unwrap_or(chip).parse().ok()
    }
}

/// The `cape-inputs.json` document.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CapeInputDocument {
    #[serde(default)]
    pub inputs: Vec<CapeInputEntry>,
}

/// One output of a cape definition file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapeOutput {
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub pru: Option<u32>,
    #[serde(default)]
    pub pru_pin: Option<u32>,
}

impl CapeOutput {
    /// Outputs without a pin name that are addressed through a PRU bit are
    /// latched: several strings share the pin through external latches.
    pub fn is_latched(&self) -> bool {
        self.pin_name().is_none() && self.pru.is_some() && self.pru_pin.is_some()
    }

    pub fn locator(&self) -> Option<PinLocator> {
        match (self.pin_name(), self.pru, self.pru_pin) {
            (Some(pin), _, _) => Some(PinLocator::Name(pin.to_string())),
            (None, Some(pru), Some(pru_pin)) => Some(PinLocator::Pru { pru, pru_pin }),
            _ => None,
        }
    }

    /// An empty pin name counts as absent.
    fn pin_name(&self) -> Option<&str> {
        self.pin.as_deref().filter(|p| !p.is_empty())
    }
}

/// A cape definition file (`tmp/pwm/<subType>.json`, `tmp/strings/<subType>.json`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CapeDefinition {
    #[serde(default)]
    pub outputs: Vec<Option<CapeOutput>>,
}

/// The outputs of one enabled channel output entry, resolved through its
/// cape definition file.
#[derive(Debug, Clone, PartialEq)]
pub struct CapeOutputGroup {
    pub output_type: String,
    pub sub_type: String,
    pub outputs: Vec<Option<CapeOutput>>,
}

/// Every document the aggregator consults, already parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocuments {
    pub gpio_inputs: Option<Vec<GpioInputEntry>>,
    pub channel_outputs: Option<ChannelOutputDocument>,
    pub cape_inputs: Option<CapeInputDocument>,
    pub pwm: Vec<CapeOutputGroup>,
    pub strings: Vec<CapeOutputGroup>,
}

impl ConfigDocuments {
    /// Read the documents for every enabled source.
    pub fn load(config_dir: &Path, tmp_dir: &Path, sources: &[SourceKind]) -> Self {
        let enabled = |kind: SourceKind| sources.contains(&kind);
        let mut docs = Self::default();

        if enabled(SourceKind::GpioInputs) {
            docs.gpio_inputs = read_document(&config_dir.join(GPIO_INPUTS_FILE));
        }
        if enabled(SourceKind::ChannelOutputs) {
            docs.channel_outputs = read_document(&config_dir.join(CHANNEL_OUTPUTS_FILE));
        }
        if enabled(SourceKind::CapeInputs) || enabled(SourceKind::CapeInputActions) {
            docs.cape_inputs = read_first_document(&[
                tmp_dir.join(CAPE_INPUTS_FILE),
                config_dir.join(CAPE_INPUTS_FILE),
            ]);
        }
        if enabled(SourceKind::CapePwm) {
            docs.pwm = load_output_groups(
                &config_dir.join(PWM_OUTPUTS_FILE),
                &tmp_dir.join(PWM_DEFINITIONS_DIR),
            );
        }
        if enabled(SourceKind::CapeStrings) {
            docs.strings = STRING_OUTPUTS_FILES
                .iter()
                .flat_map(|file| {
                    load_output_groups(
                        &config_dir.join(file),
                        &tmp_dir.join(STRING_DEFINITIONS_DIR),
                    )
                })
                .collect();
        }

        docs
    }
}

/// Read and parse one optional JSON document.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        debug!("Skipping {:?}: not present", path);
        return None;
    }

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("Skipping {:?}: {}", path, e);
            return None;
        }
    };

    match serde_json::from_str(&text) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!("Skipping malformed {:?}: {}", path, e);
            None
        }
    }
}

/// Read the first of `paths` that exists.
fn read_first_document<T: DeserializeOwned>(paths: &[PathBuf]) -> Option<T> {
    let path = paths.iter().find(|path| path.exists())?;
    read_document(path)
}

/// Resolve the enabled entries of a channel output document to the outputs
/// declared by their cape definition files.
fn load_output_groups(document: &Path, definitions_dir: &Path) -> Vec<CapeOutputGroup> {
    let Some(doc) = read_document::<ChannelOutputDocument>(document) else {
        return Vec::new();
    };

    doc.channel_outputs
        .into_iter()
        .filter(|entry| entry.enabled)
        .filter_map(|entry| {
            let sub_type = entry.sub_type.filter(|s| !s.is_empty())?;
            let path = definition_path(definitions_dir, &sub_type)?;
            let definition = read_document::<CapeDefinition>(&path)?;
            Some(CapeOutputGroup {
                output_type: entry.output_type,
                sub_type,
                outputs: definition.outputs,
            })
        })
        .collect()
}

/// Path of a cape definition, refusing names that would leave the directory.
fn definition_path(dir: &Path, sub_type: &str) -> Option<PathBuf> {
    if sub_type.contains('/') || sub_type.contains('\\') || sub_type.contains("..") {
        warn!("Ignoring cape definition with unsafe name '{}'", sub_type);
        return None;
    }
    Some(dir.join(format!("{}.json", sub_type)))
}
