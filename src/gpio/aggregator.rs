//! Merge of pin usage from every configuration source into one pin table.

use crate::config::PLATFORM_RASPBERRY_PI;
use crate::error::{AdminError, Result};
use crate::gpio::data::{Claim, PinLocator, PinRecord};
use crate::gpio::inventory::PinInventory;
use crate::gpio::levels::{DefaultLevelReader, LevelReader};
use crate::gpio::sources::{CapeOutputGroup, ConfigDocuments, SourceKind};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Pins a Raspberry Pi always dedicates to its I2C-1 bus.
const RASPBERRY_PI_FIXED: [(&str, &str, &str); 2] = [("P1-3", "I2C-1", "SDA"), ("P1-5", "I2C-1", "SCL")];

/// Settings for one aggregation run.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    /// Hardware platform name
    pub platform: String,
    /// Display name of the installed cape, used in output labels
    pub cape_name: Option<String>,
    /// Directory with user-edited documents
    pub config_dir: PathBuf,
    /// Directory with boot-generated cape documents
    pub tmp_dir: PathBuf,
    /// Sources to apply; order is always that of `SourceKind::ALL`
    pub enabled_sources: Vec<SourceKind>,
}

impl AggregatorConfig {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            cape_name: None,
            config_dir: PathBuf::from("/home/fpp/media/config"),
            tmp_dir: PathBuf::from("/home/fpp/media/tmp"),
            enabled_sources: SourceKind::ALL.to_vec(),
        }
    }

    pub fn with_cape_name(mut self, cape_name: Option<String>) -> Self {
        self.cape_name = cape_name.filter(|name| !name.trim().is_empty());
        self
    }

    pub fn with_dirs(mut self, config_dir: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>) -> Self {
        self.config_dir = config_dir.into();
        self.tmp_dir = tmp_dir.into();
        self
    }

    pub fn with_sources(mut self, sources: Vec<SourceKind>) -> Self {
        self.enabled_sources = sources;
        self
    }

    pub fn is_enabled(&self, source: SourceKind) -> bool {
        self.enabled_sources.contains(&source)
    }

    /// Prefix a cape output label with the cape name when one is known.
    fn cape_label(&self, label: &str) -> String {
        match &self.cape_name {
            Some(cape) => format!("{} {}", cape, label),
            None => label.to_string(),
        }
    }
}

/// The pin table under construction.
struct PinTable {
    pins: Vec<PinRecord>,
    /// Pins whose role is fixed by the platform and cannot be relabelled
    reserved: Vec<bool>,
}

impl PinTable {
    fn new(mut pins: Vec<PinRecord>) -> Self {
        for pin in &mut pins {
            pin.reset_usage();
        }
        let reserved = vec![false; pins.len()];
        Self { pins, reserved }
    }

    fn resolve(&self, locator: &PinLocator) -> Vec<usize> {
        self.pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| locator.matches(pin))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Apply a claim to every pin the locator resolves to.
    fn claim(&mut self, locator: &PinLocator, claim: &Claim) -> usize {
        let targets = self.resolve(locator);
        if targets.is_empty() {
            debug!("No pin matches {} for '{}'", locator, claim.function);
        }
        for &idx in &targets {
            self.claim_index(idx, claim);
        }
        targets.len()
    }

    fn claim_index(&mut self, idx: usize, claim: &Claim) {
        let pin = &mut self.pins[idx];

        if pin.is_claimed() {
            pin.config_error = true;
            if pin.config_conflict.is_empty() {
                let previous = pin.function.clone();
                pin.config_conflict.push(previous, pin.description.as_deref());
            }
            pin.config_conflict
                .push(claim.function.clone(), claim.description.as_deref());
            warn!(
                "Pin {} claimed by '{}' but already used by '{}'",
                pin.pin, claim.function, pin.function
            );
        }

        if self.reserved[idx] {
            return;
        }

        pin.in_use = Some(true);
        pin.function = claim.function.clone();
        pin.description = claim.description.clone();
        if claim.input {
            pin.input = true;
        }
        if claim.output {
            pin.output = true;
        }
    }

    /// Set a platform role without conflict checks and lock it.
    fn reserve(&mut self, idx: usize, claim: &Claim) {
        let pin = &mut self.pins[idx];
        pin.in_use = Some(true);
        pin.function = claim.function.clone();
        pin.description = claim.description.clone();
        pin.input = claim.input;
        pin.output = claim.output;
        self.reserved[idx] = true;
    }

    /// Record one more latched output sharing an already claimed pin.
    fn append_latched(&mut self, idx: usize, output_number: usize) {
        if self.reserved[idx] {
            return;
        }
        let pin = &mut self.pins[idx];
        let description = match pin.description.take() {
            Some(existing) => format!("{},{}", existing, output_number),
            None => output_number.to_string(),
        };
        pin.description = Some(description);
        pin.output = true;
    }

    fn into_pins(self) -> Vec<PinRecord> {
        self.pins
    }
}

/// Builds the annotated pin list for one request.
pub struct GpioAggregator {
    config: AggregatorConfig,
}

impl GpioAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Read every enabled document from disk and merge it into the pins.
    pub fn aggregate(&self, pins: Vec<PinRecord>) -> Vec<PinRecord> {
        let docs = ConfigDocuments::load(
            &self.config.config_dir,
            &self.config.tmp_dir,
            &self.config.enabled_sources,
        );
        self.aggregate_documents(pins, &docs)
    }

    /// Merge already parsed documents into the pins.
    pub fn aggregate_documents(&self, pins: Vec<PinRecord>, docs: &ConfigDocuments) -> Vec<PinRecord> {
        let mut table = PinTable::new(pins);

        for source in SourceKind::ALL {
            if !self.config.is_enabled(source) {
                debug!("Source '{}' disabled", source.label());
                continue;
            }
            match source {
                SourceKind::PlatformDefaults => self.apply_platform_defaults(&mut table),
                SourceKind::GpioInputs => self.apply_gpio_inputs(&mut table, docs),
                SourceKind::ChannelOutputs => self.apply_channel_outputs(&mut table, docs),
                SourceKind::CapeInputs => self.apply_cape_inputs(&mut table, docs),
                SourceKind::CapeInputActions => self.apply_cape_input_actions(&mut table, docs),
                SourceKind::CapePwm => self.apply_pwm_outputs(&mut table, &docs.pwm),
                SourceKind::CapeStrings => self.apply_string_outputs(&mut table, &docs.strings),
            }
        }

        table.into_pins()
    }

    fn apply_platform_defaults(&self, table: &mut PinTable) {
        for pin in &mut table.pins {
            let Some(uart) = pin.uart.as_deref().filter(|u| !u.is_empty()) else {
                continue;
            };
            pin.in_use = Some(true);
            pin.function = format!("UART {}", uart);
            pin.input = uart.ends_with("rx");
            pin.output = uart.ends_with("tx");
        }

        if self.config.platform == PLATFORM_RASPBERRY_PI {
            for (name, function, description) in RASPBERRY_PI_FIXED {
                let claim = Claim::bidirectional(function, description);
                for idx in table.resolve(&PinLocator::Name(name.to_string())) {
                    table.reserve(idx, &claim);
                }
            }
        }
    }

    fn apply_gpio_inputs(&self, table: &mut PinTable, docs: &ConfigDocuments) {
        let Some(entries) = &docs.gpio_inputs else {
            return;
        };
        for entry in entries.iter().filter(|e| e.enabled) {
            let claim = Claim::input("GPIO Input", entry.desc.clone());
            table.claim(&PinLocator::Name(entry.pin.clone()), &claim);
        }
    }

    fn apply_channel_outputs(&self, table: &mut PinTable, docs: &ConfigDocuments) {
        let Some(doc) = &docs.channel_outputs else {
            return;
        };
        let gpio_outputs = doc
            .channel_outputs
            .iter()
            .filter(|e| e.output_type == "GPIO" && e.enabled);
        for entry in gpio_outputs {
            let Some(gpio) = &entry.gpio else {
                debug!("GPIO channel output without a gpio field");
                continue;
            };
            let claim = Claim::output("Channel Output", entry.description.clone());
            table.claim(&gpio.locator(), &claim);
        }
    }

    fn apply_cape_inputs(&self, table: &mut PinTable, docs: &ConfigDocuments) {
        let Some(doc) = &docs.cape_inputs else {
            return;
        };
        for entry in doc.inputs.iter().filter(|e| e.is_gpiod()) {
            let Some(locator) = entry.locator() else {
                continue;
            };
            let description = match &entry.chip {
                Some(chip) => format!("Interrupt for: {}", chip),
                None => "Cape input".to_string(),
            };
            table.claim(&locator, &Claim::input("Cape Controls", description));
        }
    }

    fn apply_cape_input_actions(&self, table: &mut PinTable, docs: &ConfigDocuments) {
        let Some(doc) = &docs.cape_inputs else {
            return;
        };
        for entry in doc.inputs.iter().filter(|e| e.is_gpiod()) {
            let Some(pin) = entry.pin.as_deref().filter(|p| !p.is_empty()) else {
                continue;
            };
            for action in &entry.actions {
                let sub_line = format!("{}-{}", pin, action.line);
                let label = action
                    .label
                    .clone()
                    .unwrap_or_else(|| format!("Line {}", action.line));
                table.claim(&PinLocator::Name(sub_line), &Claim::input("Cape Input", label));
            }
        }
    }

    fn apply_pwm_outputs(&self, table: &mut PinTable, groups: &[CapeOutputGroup]) {
        let function = self.config.cape_label("PWM Output");
        for group in groups {
            for (idx, output) in group.outputs.iter().enumerate() {
                let Some(locator) = output.as_ref().and_then(|o| o.locator()) else {
                    continue;
                };
                let claim = Claim::output(function.clone(), format!("Output {}", idx + 1));
                table.claim(&locator, &claim);
            }
        }
    }

    fn apply_string_outputs(&self, table: &mut PinTable, groups: &[CapeOutputGroup]) {
        let function = self.config.cape_label("String Output");
        let latched_function = self.config.cape_label("Latched String Output");

        for group in groups {
            // Pins already claimed by a latched output of this entry.
            let mut latched_used: HashSet<usize> = HashSet::new();

            for (idx, output) in group.outputs.iter().enumerate() {
                let Some(output) = output else {
                    continue;
                };
                let Some(locator) = output.locator() else {
                    continue;
                };
                let number = idx + 1;

                if !output.is_latched() {
                    let claim = Claim::output(function.clone(), format!("Output {}", number));
                    table.claim(&locator, &claim);
                    continue;
                }

                for pin_idx in table.resolve(&locator) {
                    if latched_used.insert(pin_idx) {
                        let claim =
                            Claim::output(latched_function.clone(), format!("Outputs {}", number));
                        table.claim_index(pin_idx, &claim);
                    } else {
                        table.append_latched(pin_idx, number);
                    }
                }
            }
        }
    }
}

/// Fetch the inventory and annotate it with every configured source.
///
/// Document problems are logged and skipped; only a failed inventory fetch
/// is an error.
pub async fn gpio_config(
    inventory: &dyn PinInventory,
    config: AggregatorConfig,
) -> Result<Vec<PinRecord>> {
    let pins = inventory.fetch_pins().await?;
    let total = pins.len();

    // Document reads and line access block.
    let pins = tokio::task::spawn_blocking(move || {
        let aggregator = GpioAggregator::new(config);
        let mut pins = aggregator.aggregate(pins);

        let mut reader = DefaultLevelReader::new();
        if reader.is_available() {
            reader.read_levels(&mut pins);
        } else {
            debug!("Pin levels unavailable on this system");
        }
        pins
    })
    .await
    .map_err(|e| AdminError::web_server_error(format!("Aggregation task failed: {}", e)))?;

    let conflicts = pins.iter().filter(|p| p.config_error).count();
    info!("Annotated {} pins ({} with conflicts)", total, conflicts);

    Ok(pins)
}
