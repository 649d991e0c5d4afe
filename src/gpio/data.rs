//! Data structures for the annotated pin table.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Function label of a pin nobody has claimed.
pub const AVAILABLE: &str = "--Available--";

/// One physical (or expander sub-line) pin as reported by the inventory,
/// plus the usage fields filled in by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PinRecord {
    /// Pin identifier, e.g. "P1-3", "P9-12" or "<pin>-<line>"
    #[serde(default)]
    pub pin: String,
    /// GPIO chip index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpio_chip: Option<u32>,
    /// Line within the GPIO chip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpio_line: Option<u32>,
    /// Legacy kernel GPIO number (chip 0 only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpio: Option<u32>,
    /// PRU driving this pin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pru: Option<u32>,
    /// Bit of the PRU output register wired to this pin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pru_pin: Option<u32>,
    /// Hardwired UART role, e.g. "uart2tx"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uart: Option<String>,
    /// Any other inventory attributes, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// `None` until some source claims the pin
    #[serde(default)]
    pub in_use: Option<bool>,
    #[serde(default)]
    pub input: bool,
    #[serde(default)]
    pub output: bool,
    /// Label of the last subsystem to claim the pin
    #[serde(default = "default_function")]
    pub function: String,
    /// Detail of the last claim
    #[serde(default)]
    pub description: Option<String>,
    /// Set once a second claim lands on the pin
    #[serde(default)]
    pub config_error: bool,
    /// Every competing claim, in arrival order
    #[serde(default)]
    pub config_conflict: ConflictLog,
    /// Live line level, when it can be read
    #[serde(default)]
    pub current_value: Option<bool>,
}

fn default_function() -> String {
    AVAILABLE.to_string()
}

impl PinRecord {
    /// Create a bare pin with only its name set.
    pub fn new(pin: impl Into<String>) -> Self {
        Self {
            pin: pin.into(),
            gpio_chip: None,
            gpio_line: None,
            gpio: None,
            pru: None,
            pru_pin: None,
            uart: None,
            extra: Map::new(),
            in_use: None,
            input: false,
            output: false,
            function: default_function(),
            description: None,
            config_error: false,
            config_conflict: ConflictLog::default(),
            current_value: None,
        }
    }

    /// Set the chip/line address.
    pub fn with_line(mut self, chip: u32, line: u32) -> Self {
        self.gpio_chip = Some(chip);
        self.gpio_line = Some(line);
        if chip == 0 {
            self.gpio = Some(line);
        }
        self
    }

    /// Set the PRU address.
    pub fn with_pru(mut self, pru: u32, pru_pin: u32) -> Self {
        self.pru = Some(pru);
        self.pru_pin = Some(pru_pin);
        self
    }

    /// Set the hardwired UART role.
    pub fn with_uart(mut self, uart: impl Into<String>) -> Self {
        self.uart = Some(uart.into());
        self
    }

    /// Reset every derived field to its unclaimed state.
    pub fn reset_usage(&mut self) {
        self.in_use = None;
        self.input = false;
        self.output = false;
        self.function = default_function();
        self.description = None;
        self.config_error = false;
        self.config_conflict = ConflictLog::default();
        self.current_value = None;
    }

    /// Whether any source has claimed the pin.
    pub fn is_claimed(&self) -> bool {
        self.in_use == Some(true)
    }
}

/// One competing claim recorded on a pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    pub function: String,
    pub description: String,
}

/// Ordered history of the claims that collided on one pin.
///
/// Serialized as `{Function : Description}` segments concatenated in
/// arrival order, or `null` while empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictLog {
    entries: Vec<ConflictEntry>,
}

impl ConflictLog {
    pub fn push(&mut self, function: impl Into<String>, description: Option<&str>) {
        self.entries.push(ConflictEntry {
            function: function.into(),
            description: description.unwrap_or_default().to_string(),
        });
    }

    pub fn entries(&self) -> &[ConflictEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the display string, `None` when nothing collided.
    pub fn render(&self) -> Option<String> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.to_string())
        }
    }

    /// Parse a rendered conflict string back into entries.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .split('}')
            .filter_map(|segment| segment.trim_start().strip_prefix('{'))
            .map(|segment| match segment.split_once(" : ") {
                Some((function, description)) => ConflictEntry {
                    function: function.to_string(),
                    description: description.to_string(),
                },
                None => ConflictEntry {
                    function: segment.to_string(),
                    description: String::new(),
                },
            })
            .collect();
        Self { entries }
    }
}

impl fmt::Display for ConflictLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            write!(f, "{{{} : {}}}", entry.function, entry.description)?;
        }
        Ok(())
    }
}

impl Serialize for ConflictLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.render() {
            Some(text) => serializer.serialize_str(&text),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ConflictLog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        Ok(text.map(|t| Self::parse(&t)).unwrap_or_default())
    }
}

/// What a configuration source asserts about a pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub function: String,
    pub description: Option<String>,
    pub input: bool,
    pub output: bool,
}

impl Claim {
    /// A claim that uses the pin as an input.
    pub fn input(function: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            description: Some(description.into()),
            input: true,
            output: false,
        }
    }

    /// A claim that drives the pin as an output.
    pub fn output(function: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            description: Some(description.into()),
            input: false,
            output: true,
        }
    }

    /// A claim that uses the pin in both directions (buses).
    pub fn bidirectional(function: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            description: Some(description.into()),
            input: true,
            output: true,
        }
    }
}

/// How a configuration entry refers to a pin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PinLocator {
    /// Exact pin name
    Name(String),
    /// Chip/line address
    Line { chip: u32, line: u32 },
    /// Legacy kernel GPIO number
    Legacy(u32),
    /// PRU output bit
    Pru { pru: u32, pru_pin: u32 },
}

impl PinLocator {
    pub fn matches(&self, pin: &PinRecord) -> bool {
        match self {
            Self::Name(name) => pin.pin == *name,
            Self::Line { chip, line } => {
                pin.gpio_chip == Some(*chip) && pin.gpio_line == Some(*line)
            }
            Self::Legacy(number) => match pin.gpio {
                Some(gpio) => gpio == *number,
                None => pin.gpio_chip == Some(0) && pin.gpio_line == Some(*number),
            },
            Self::Pru { pru, pru_pin } => pin.pru == Some(*pru) && pin.pru_pin == Some(*pru_pin),
        }
    }
}

impl fmt::Display for PinLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{}", name),
            Self::Line { chip, line } => write!(f, "gpiochip{}/{}", chip, line),
            Self::Legacy(number) => write!(f, "GPIO {}", number),
            Self::Pru { pru, pru_pin } => write!(f, "PRU{} pin {}", pru, pru_pin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inventory_record_defaults() {
        let pin: PinRecord = serde_json::from_value(json!({
            "pin": "P9-12",
            "gpioChip": 1,
            "gpioLine": 28,
            "pwm": 1,
            "supportsPullUp": true
        }))
        .unwrap();

        assert_eq!(pin.function, AVAILABLE);
        assert_eq!(pin.in_use, None);
        assert!(pin.config_conflict.is_empty());
        assert_eq!(pin.extra.get("pwm"), Some(&json!(1)));
        assert_eq!(pin.extra.get("supportsPullUp"), Some(&json!(true)));
    }

    #[test]
    fn test_serialized_field_names() {
        let pin = PinRecord::new("P1-7").with_line(0, 4);
        let value = serde_json::to_value(&pin).unwrap();

        assert_eq!(value["pin"], "P1-7");
        assert_eq!(value["gpioChip"], 0);
        assert_eq!(value["gpioLine"], 4);
        assert_eq!(value["gpio"], 4);
        assert_eq!(value["inUse"], Value::Null);
        assert_eq!(value["function"], AVAILABLE);
        assert_eq!(value["configError"], false);
        assert_eq!(value["configConflict"], Value::Null);
        assert!(value.get("pru").is_none());
    }

    #[test]
    fn test_conflict_rendering() {
        let mut log = ConflictLog::default();
        assert_eq!(log.render(), None);

        log.push("GPIO Input", Some("Button"));
        log.push("Channel Output", Some("Relay"));
        log.push("PWM Output", None);

        assert_eq!(
            log.render().as_deref(),
            Some("{GPIO Input : Button}{Channel Output : Relay}{PWM Output : }")
        );
        assert_eq!(ConflictLog::parse(&log.to_string()), log);
    }

    #[test]
    fn test_locator_matching() {
        let pin = PinRecord::new("P8-43").with_line(2, 8).with_pru(1, 2);

        assert!(PinLocator::Name("P8-43".into()).matches(&pin));
        assert!(!PinLocator::Name("P8-44".into()).matches(&pin));
        assert!(PinLocator::Line { chip: 2, line: 8 }.matches(&pin));
        assert!(!PinLocator::Legacy(8).matches(&pin));
        assert!(PinLocator::Pru { pru: 1, pru_pin: 2 }.matches(&pin));

        let pi_pin = PinRecord::new("P1-11").with_line(0, 17);
        assert!(PinLocator::Legacy(17).matches(&pi_pin));
    }
}
