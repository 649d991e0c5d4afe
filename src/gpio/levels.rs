//! Live line levels for the annotated pin table.
//!
//! Reading levels needs direct GPIO access, so it's feature-gated to allow
//! compilation (and aggregation) on machines without a Raspberry Pi header.

use crate::gpio::data::PinRecord;

/// Fills in `current_value` for the pins it can read.
pub trait LevelReader {
    /// Whether levels can be read on this system at all.
    fn is_available(&self) -> bool;

    /// Read the level of every readable pin; unreadable pins are left `None`.
    fn read_levels(&mut self, pins: &mut [PinRecord]);
}

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use crate::error::{AdminError, Result};
    use rppal::gpio::{Gpio, Level};
    use tracing::{debug, warn};

    /// Level reader backed by rppal. Only chip 0 (the SoC header) is readable.
    pub struct RaspberryPiLevels {
        gpio: Option<Gpio>,
    }

    impl RaspberryPiLevels {
        /// Reader that reports nothing when the GPIO device cannot be opened.
        pub fn new() -> Self {
            match Self::try_new() {
                Ok(reader) => reader,
                Err(e) => {
                    warn!("Pin levels will not be reported: {}", e);
                    Self { gpio: None }
                }
            }
        }

        pub fn try_new() -> Result<Self> {
            let gpio = Gpio::new()
                .map_err(|e| AdminError::gpio_error(format!("Cannot open GPIO device: {}", e)))?;
            Ok(Self { gpio: Some(gpio) })
        }
    }

    impl Default for RaspberryPiLevels {
        fn default() -> Self {
            Self::new()
        }
    }

    impl LevelReader for RaspberryPiLevels {
        fn is_available(&self) -> bool {
            self.gpio.is_some()
        }

        fn read_levels(&mut self, pins: &mut [PinRecord]) {
            let Some(gpio) = &self.gpio else {
                return;
            };
            for pin in pins.iter_mut() {
                let (Some(0), Some(line)) = (pin.gpio_chip, pin.gpio_line) else {
                    continue;
                };
                let Ok(line) = u8::try_from(line) else {
                    continue;
                };
                match gpio.get(line) {
                    Ok(p) => pin.current_value = Some(p.read() == Level::High),
                    // Pins held by another driver can't be opened
                    Err(e) => debug!("Cannot read {}: {}", pin.pin, e),
                }
            }
        }
    }
}

#[cfg(not(feature = "gpio"))]
mod mock {
    use super::*;

    /// Level reader for systems without GPIO support.
    pub struct MockLevels;

    impl MockLevels {
        pub fn new() -> Self {
            Self
        }
    }

    impl Default for MockLevels {
        fn default() -> Self {
            Self::new()
        }
    }

    impl LevelReader for MockLevels {
        fn is_available(&self) -> bool {
            false
        }

        fn read_levels(&mut self, _pins: &mut [PinRecord]) {}
    }
}

// Re-export the appropriate level reader
#[cfg(feature = "gpio")]
pub use raspberry_pi::RaspberryPiLevels as DefaultLevelReader;

#[cfg(not(feature = "gpio"))]
pub use mock::MockLevels as DefaultLevelReader;

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "gpio"))]
    #[test]
    fn test_mock_reader_leaves_levels_unset() {
        let mut reader = DefaultLevelReader::new();
        let mut pins = vec![PinRecord::new("P1-7").with_line(0, 4)];
        reader.read_levels(&mut pins);

        assert!(!reader.is_available());
        assert_eq!(pins[0].current_value, None);
    }
}
