//! Storage maintenance actions offered for the running system.

use crate::config::{PLATFORM_BEAGLEBONE_BLACK, PLATFORM_RASPBERRY_PI};
use serde::Serialize;

/// SD cards imaged with a small root partition end below this block.
pub const GROWABLE_LAST_BLOCK: u64 = 8_000_000;

/// Which maintenance actions apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageActions {
    pub grow_filesystem: bool,
    pub new_partition: bool,
    pub flash_emmc: bool,
    pub flash_usb: bool,
}

impl StorageActions {
    /// Decide the actions from the root partition, the board and the SD card
    /// layout. Nothing applies unless the system runs from the SD card.
    pub fn evaluate(
        root_device: &str,
        platform: &str,
        sub_platform: &str,
        last_block: Option<u64>,
        usb_present: bool,
    ) -> Self {
        let sd_root = matches!(root_device, "mmcblk0p1" | "mmcblk0p2");
        if !sd_root {
            return Self::default();
        }

        let growable = last_block.is_some_and(|block| block > 0 && block < GROWABLE_LAST_BLOCK);
        let flash_emmc =
            platform == PLATFORM_BEAGLEBONE_BLACK && !sub_platform.contains("PocketBeagle");
        let flash_usb = platform == PLATFORM_RASPBERRY_PI
            && sub_platform.contains("Raspberry Pi 4")
            && usb_present;

        Self {
            grow_filesystem: growable,
            new_partition: growable,
            flash_emmc,
            flash_usb,
        }
    }

    pub fn any(&self) -> bool {
        self.grow_filesystem || self.new_partition || self.flash_emmc || self.flash_usb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_on_sd_card() {
        let actions = StorageActions::evaluate(
            "sda1",
            PLATFORM_RASPBERRY_PI,
            "Raspberry Pi 4 Model B",
            Some(4_000_000),
            true,
        );
        assert!(!actions.any());
    }

    #[test]
    fn test_small_sd_card_can_grow() {
        let actions =
            StorageActions::evaluate("mmcblk0p2", PLATFORM_RASPBERRY_PI, "Raspberry Pi 3", Some(7_000_000), false);
        assert!(actions.grow_filesystem);
        assert!(actions.new_partition);
        assert!(!actions.flash_usb);

        let unknown = StorageActions::evaluate("mmcblk0p2", PLATFORM_RASPBERRY_PI, "", Some(0), false);
        assert!(!unknown.grow_filesystem);
    }

    #[test]
    fn test_beaglebone_emmc() {
        let bbb = StorageActions::evaluate("mmcblk0p1", PLATFORM_BEAGLEBONE_BLACK, "BeagleBone Black Wireless", None, false);
        assert!(bbb.flash_emmc);

        let pocket = StorageActions::evaluate("mmcblk0p1", PLATFORM_BEAGLEBONE_BLACK, "PocketBeagle", None, false);
        assert!(!pocket.flash_emmc);
    }

    #[test]
    fn test_pi4_usb_flash_needs_disk() {
        let sub = "Raspberry Pi 4 Model B Rev 1.4";
        assert!(StorageActions::evaluate("mmcblk0p2", PLATFORM_RASPBERRY_PI, sub, None, true).flash_usb);
        assert!(!StorageActions::evaluate("mmcblk0p2", PLATFORM_RASPBERRY_PI, sub, None, false).flash_usb);
    }
}
