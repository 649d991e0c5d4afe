//! GPIO option lists with cape show/hide filtering.

use crate::error::{AdminError, Result};
use crate::options::KeyedOptions;
use regex::Regex;
use serde_json::Value;

/// Include/exclude patterns applied to pin names.
#[derive(Debug, Clone, Default)]
pub struct PinFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl PinFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>> {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        AdminError::config_error(format!("Invalid GPIO filter '{}': {}", p, e))
                    })
                })
                .collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// A pin is shown when it matches an include pattern (or there are none)
    /// and matches no exclude pattern.
    pub fn shows(&self, pin: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|re| re.is_match(pin));
        included && !self.exclude.iter().any(|re| re.is_match(pin))
    }
}

fn pin_name(record: &Value) -> &str {
    record.get("pin").and_then(Value::as_str).unwrap_or_default()
}

/// Inventory records that pass the filter.
pub fn visible_records(records: Vec<Value>, filter: &PinFilter) -> Vec<Value> {
    records
        .into_iter()
        .filter(|record| filter.shows(pin_name(record)))
        .collect()
}

/// `pin` → `"<pin> (GPIO <chip>/<line>)"` for visible pins.
pub fn pin_labels(records: &[Value], filter: &PinFilter) -> KeyedOptions {
    let mut options = KeyedOptions::default();
    for record in records {
        let pin = pin_name(record);
        if pin.is_empty() || !filter.shows(pin) {
            continue;
        }
        let field = |name: &str| {
            record
                .get(name)
                .map(|v| v.to_string())
                .unwrap_or_default()
        };
        options.insert(
            pin,
            format!("{} (GPIO {}/{})", pin, field("gpioChip"), field("gpioLine")),
        );
    }
    options
}
