//! Locale, timezone and board option lists.

use crate::config::PLATFORM_BEAGLEBONE_64;
use crate::error::Result;
use crate::options::KeyedOptions;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Locale definition names (`*.json` basenames), sorted.
pub fn locales(locale_dir: &Path) -> Result<KeyedOptions> {
    let mut names: Vec<String> = fs::read_dir(locale_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            name.strip_suffix(".json").map(str::to_string)
        })
        .collect();
    names.sort();

    let mut options = KeyedOptions::default();
    for name in names {
        options.insert(name.clone(), name);
    }
    Ok(options)
}

/// Timezone names from the zoneinfo tree, without the `right/` and `posix/`
/// duplicates or auxiliary files.
pub fn timezones(zoneinfo_dir: &Path) -> Vec<String> {
    let mut zones: Vec<String> = WalkDir::new(zoneinfo_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(zoneinfo_dir).ok()?;
            Some(relative.to_string_lossy().to_string())
        })
        .filter(|zone| {
            !zone.starts_with("right") && !zone.starts_with("posix") && !zone.contains('.')
        })
        .collect();
    zones.sort();
    zones
}

/// Supported real time clock chips.
pub fn rtc_options() -> KeyedOptions {
    let mut options = KeyedOptions::default();
    options.insert("None/Built In", "N");
    options.insert("DS1305 / DS1307 / DS3231 (PiCap)", "2");
    options.insert("pcf8523 (Kulp / Adafruit PiRTC)", "4");
    options.insert("pcf85363 (Kulp)", "5");
    options.insert("mcp7941x (PiFace)", "3");
    options.insert("pcf2127 (RasClock)", "1");
    options.insert("pcf8563", "6");
    options
}

/// BeagleBone user LED triggers. The 64-bit boards number their MMC
/// controllers the other way round.
pub fn bbb_led_options(platform: &str) -> KeyedOptions {
    let mut options = KeyedOptions::default();
    options.insert("Disabled", "none");
    options.insert("Heartbeat", "heartbeat");
    options.insert("CPU Activity", "cpu");
    if platform == PLATFORM_BEAGLEBONE_64 {
        options.insert("SD Card Activity", "mmc1");
        options.insert("eMMC Activity", "mmc0");
    } else {
        options.insert("SD Card Activity", "mmc0");
        options.insert("eMMC Activity", "mmc1");
    }
    options
}
