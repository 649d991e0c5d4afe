//! ALSA sound card enumeration.

use crate::error::{AdminError, Result};
use crate::options::runner::CommandRunner;
use crate::options::KeyedOptions;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Lists playback devices.
pub const PLAYBACK_PROGRAM: &str = "aplay";
/// Lists capture devices.
pub const CAPTURE_PROGRAM: &str = "arecord";
/// Lists mixer controls.
pub const MIXER_PROGRAM: &str = "amixer";

/// Label shown when the selected card is not present.
pub const SELECT_DEVICE: &str = "-- Select an Audio Device --";
/// Pseudo input that captures whatever media is playing.
pub const PLAYING_MEDIA: &str = "-- Playing Media --";

/// One `card N: ...` line of `aplay -l` / `arecord -l`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlsaDevice {
    /// Card number
    pub card: String,
    /// Card long name, the first bracketed field
    pub name: String,
    /// Device name, the last bracketed field
    pub device: String,
}

/// Parse `card 0: Headphones [bcm2835 Headphones], device 0: bcm2835 Headphones [bcm2835 Headphones]`.
pub fn parse_device_line(line: &str) -> Option<AlsaDevice> {
    let rest = line.strip_prefix("card ")?;
    let (card, rest) = rest.split_once(':')?;

    let mut fields = Vec::new();
    let mut remaining = rest;
    while let Some(start) = remaining.find('[') {
        let after = &remaining[start + 1..];
        let end = after.find(']')?;
        fields.push(&after[..end]);
        remaining = &after[end + 1..];
    }

    let name = fields.first()?.to_string();
    let device = fields.last().map(|s| s.to_string()).unwrap_or_default();
    Some(AlsaDevice {
        card: card.trim().to_string(),
        name,
        device,
    })
}

fn list_devices(runner: &dyn CommandRunner, program: &str) -> Result<Vec<AlsaDevice>> {
    let lines = runner.run(program, &["-l"])?;
    Ok(lines
        .iter()
        .filter(|line| line.starts_with("card"))
        .filter_map(|line| parse_device_line(line))
        .collect())
}

/// Card number currently selected in the ALSA rc file, "0" when unset.
pub fn current_card(asound_rc: &Path) -> String {
    let card = fs::read_to_string(asound_rc).ok().and_then(|text| {
        text.lines()
            .find(|line| line.contains("card"))
            .and_then(|line| line.split_whitespace().nth(1))
            .map(str::to_string)
    });

    card.unwrap_or_else(|| {
        debug!("No card selected in {:?}, assuming card 0", asound_rc);
        "0".to_string()
    })
}

/// Simple mixer controls of a card.
pub fn mixer_devices(runner: &dyn CommandRunner, card: &str) -> Result<KeyedOptions> {
    let lines = runner.run(MIXER_PROGRAM, &["-c", card, "scontrols"])?;
    if lines.first().is_some_and(|l| l.starts_with("Usage:")) {
        return Err(AdminError::command_error("amixer rejected the card number"));
    }

    let mut devices = KeyedOptions::default();
    for line in &lines {
        // Simple mixer control 'PCM',0
        let Some(name) = line.split('\'').nth(1) else {
            continue;
        };
        devices.insert(name, name);
    }
    Ok(devices)
}

/// Display name for a playback card.
fn playback_label(name: &str) -> String {
    match name {
        "bcm2835 ALSA" => format!("{} (Pi Onboard Audio)", name),
        "CD002" => format!("{} (FM Transmitter)", name),
        other => other.to_string(),
    }
}

/// Playback cards keyed by display name.
pub fn playback_options(runner: &dyn CommandRunner, current: &str) -> Result<KeyedOptions> {
    let mut devices = list_devices(runner, PLAYBACK_PROGRAM)?;
    devices.dedup_by(|a, b| a.card == b.card && a.name == b.name);

    let mut cards = KeyedOptions::default();
    let mut found = false;
    for device in &devices {
        if device.card == current {
            found = true;
        }
        cards.insert(playback_label(&device.name), device.card.clone());
    }

    if !found {
        cards.insert(SELECT_DEVICE, current);
    }
    Ok(cards)
}

/// Capture cards keyed by name.
pub fn capture_options(runner: &dyn CommandRunner) -> Result<KeyedOptions> {
    let mut devices = list_devices(runner, CAPTURE_PROGRAM)?;
    devices.dedup_by(|a, b| a.card == b.card && a.name == b.name);

    let mut cards = KeyedOptions::default();
    for device in &devices {
        cards.insert(device.name.clone(), device.card.clone());
    }
    Ok(cards)
}

/// Every device as `"<card name>, <device name>"`.
pub fn device_list(runner: &dyn CommandRunner, program: &str) -> Result<Vec<String>> {
    Ok(list_devices(runner, program)?
        .into_iter()
        .map(|d| format!("{}, {}", d.name, d.device))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::tests::FakeRunner;

    const APLAY: &[&str] = &[
        "**** List of PLAYBACK Hardware Devices ****",
        "card 0: Headphones [bcm2835 Headphones], device 0: bcm2835 Headphones [bcm2835 Headphones]",
        "  Subdevices: 8/8",
        "card 1: ALSA [bcm2835 ALSA], device 0: bcm2835 ALSA [bcm2835 ALSA]",
        "card 1: ALSA [bcm2835 ALSA], device 1: bcm2835 IEC958/HDMI [bcm2835 IEC958/HDMI]",
        "card 2: Device [USB Audio Device], device 0: USB Audio [USB Audio]",
    ];

    #[test]
    fn test_parse_device_line() {
        let device = parse_device_line(APLAY[1]).unwrap();
        assert_eq!(device.card, "0");
        assert_eq!(device.name, "bcm2835 Headphones");
        assert_eq!(device.device, "bcm2835 Headphones");
        assert!(parse_device_line("  Subdevices: 8/8").is_none());
    }

    #[test]
    fn test_playback_options() {
        let runner = FakeRunner::new().with_output(PLAYBACK_PROGRAM, APLAY);
        let cards = playback_options(&runner, "1").unwrap();

        let labels: Vec<&str> = cards.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            labels,
            vec!["bcm2835 Headphones", "bcm2835 ALSA (Pi Onboard Audio)", "USB Audio Device"]
        );
        assert_eq!(cards.get("USB Audio Device"), Some("2"));
        assert_eq!(cards.get(SELECT_DEVICE), None);
    }

    #[test]
    fn test_missing_current_card_adds_placeholder() {
        let runner = FakeRunner::new().with_output(PLAYBACK_PROGRAM, APLAY);
        let cards = playback_options(&runner, "5").unwrap();
        assert_eq!(cards.get(SELECT_DEVICE), Some("5"));
    }

    #[test]
    fn test_device_list() {
        let runner = FakeRunner::new().with_output(PLAYBACK_PROGRAM, APLAY);
        let list = device_list(&runner, PLAYBACK_PROGRAM).unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list[2], "bcm2835 ALSA, bcm2835 IEC958/HDMI");
    }

    #[test]
    fn test_mixer_devices() {
        let runner = FakeRunner::new().with_output(
            MIXER_PROGRAM,
            &["Simple mixer control 'PCM',0", "Simple mixer control 'Master',0"],
        );
        let mixers = mixer_devices(&runner, "0").unwrap();
        assert_eq!(mixers.get("PCM"), Some("PCM"));
        assert_eq!(mixers.len(), 2);

        let usage = FakeRunner::new().with_output(MIXER_PROGRAM, &["Usage: amixer <options>"]);
        assert!(mixer_devices(&usage, "9").is_err());
    }

    #[test]
    fn test_current_card() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join(".asoundrc");
        std::fs::write(&rc, "pcm.!default {\n type hw\n card 2\n}\nctl.!default {\n card 2\n}\n").unwrap();

        assert_eq!(current_card(&rc), "2");
        assert_eq!(current_card(&dir.path().join("missing")), "0");
    }
}
