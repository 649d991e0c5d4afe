//! Storage device inspection.
//!
//! Lists the SD card and USB partitions that can hold the media directory,
//! reports which one is configured and which maintenance actions apply.
//! Nothing here modifies a device.

pub mod actions;

pub use actions::StorageActions;

use crate::config::AdminConfig;
use crate::error::Result;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tracing::{debug, warn};

const SECTOR_BYTES: u64 = 512;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIN_DEVICE_GB: f64 = 0.1;

lazy_static::lazy_static! {
    /// SD card or USB partition names.
    static ref PARTITION_NAME: Regex =
        Regex::new(r"^(sd[a-z][0-9]+|mmcblk[0-9]+p[0-9]+)$").expect("partition pattern is valid");
}

/// Free space per device, in bytes.
#[derive(Debug, Clone, Default)]
pub struct DiskUsage {
    by_device: HashMap<String, u64>,
    root: Option<u64>,
}

impl DiskUsage {
    /// Read the mounted filesystems of the running system.
    pub fn probe() -> Self {
        let disks = Disks::new_with_refreshed_list();
        let mut usage = Self::default();
        for disk in disks.iter() {
            let name = disk.name().to_string_lossy();
            let name = name.strip_prefix("/dev/").unwrap_or(&name).to_string();
            if disk.mount_point() == Path::new("/") {
                usage.root = Some(disk.available_space());
            }
            usage.by_device.insert(name, disk.available_space());
        }
        debug!("Probed {} mounted filesystems", usage.by_device.len());
        usage
    }

    pub fn with_device(mut self, device: impl Into<String>, available: u64) -> Self {
        self.by_device.insert(device.into(), available);
        self
    }

    pub fn with_root(mut self, available: u64) -> Self {
        self.root = Some(available);
        self
    }
}

/// A partition that can hold the media directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageDevice {
    pub name: String,
    pub size_gb: f64,
    /// Free space in GB, `None` when not mounted
    pub free_gb: Option<f64>,
    pub boot: bool,
    pub usb: bool,
    pub label: String,
}

impl StorageDevice {
    fn new(name: String, size_gb: f64, free_gb: Option<f64>, boot: bool) -> Self {
        let usb = name.starts_with("sd");
        let free = match free_gb {
            Some(gb) => format!("{:.1}GB Free", gb),
            None => "Not Mounted".to_string(),
        };
        let mut label = format!("{} - {:.1}GB ({})", name, size_gb, free);
        if boot {
            label.push_str(" (boot device)");
        }
        if usb {
            label.push_str(" (USB)");
        }
        Self {
            name,
            size_gb,
            free_gb,
            boot,
            usb,
            label,
        }
    }
}

/// Everything the storage page shows.
#[derive(Debug, Clone, Serialize)]
pub struct StorageReport {
    pub devices: Vec<StorageDevice>,
    pub selected: String,
    pub actions: StorageActions,
}

/// Whole-disk name of a partition: `mmcblk0p2` → `mmcblk0`, `sda1` → `sda`.
pub fn base_device(partition: &str) -> &str {
    if partition.starts_with("mmcblk") || partition.starts_with("nvme") {
        if let Some(pos) = partition.rfind('p') {
            let tail = &partition[pos + 1..];
            if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
                return &partition[..pos];
            }
        }
        return partition;
    }
    partition.trim_end_matches(|c: char| c.is_ascii_digit())
}

fn strip_dev(source: &str) -> &str {
    source.strip_prefix("/dev/").unwrap_or(source)
}

/// Reads block devices and mount tables.
#[derive(Debug, Clone)]
pub struct StorageInspector {
    block_dir: PathBuf,
    dev_dir: PathBuf,
    fstab: PathBuf,
    mounts: PathBuf,
    media_dir: PathBuf,
    platform: String,
    sub_platform: String,
    last_block: Option<u64>,
    usage: DiskUsage,
}

impl StorageInspector {
    /// Inspector over the paths in `config`, with live disk usage.
    pub fn new(config: &AdminConfig) -> Self {
        Self::with_usage(config, DiskUsage::probe())
    }

    pub fn with_usage(config: &AdminConfig, usage: DiskUsage) -> Self {
        Self {
            block_dir: config.block_dir.clone(),
            dev_dir: config.dev_dir.clone(),
            fstab: config.fstab.clone(),
            mounts: config.mounts.clone(),
            media_dir: config.media_dir.clone(),
            platform: config.platform.clone(),
            sub_platform: config.sub_platform.clone(),
            last_block: config.last_block,
            usage,
        }
    }

    /// Partition mounted at `mount_point`, from the mount table.
    fn mounted_at(&self, mount_point: impl Fn(&str) -> bool) -> Option<String> {
        let text = fs::read_to_string(&self.mounts).ok()?;
        text.lines().find_map(|line| {
            let mut fields = line.split_whitespace();
            let source = fields.next()?;
            let target = fields.next()?;
            mount_point(target).then(|| strip_dev(source).to_string())
        })
    }

    /// Partition holding the root filesystem, empty when unknown.
    pub fn root_device(&self) -> String {
        self.mounted_at(|target| target == "/").unwrap_or_default()
    }

    /// Disk the system boots from.
    pub fn boot_device(&self) -> String {
        let boot = self
            .mounted_at(|target| target.starts_with("/boot"))
            .unwrap_or_else(|| self.root_device());
        base_device(&boot).to_string()
    }

    /// Partition configured to hold the media directory.
    pub fn configured_device(&self) -> Option<String> {
        let media = self.media_dir.to_string_lossy();
        let text = fs::read_to_string(&self.fstab).ok()?;
        text.lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .find(|line| line.split_whitespace().nth(1) == Some(media.as_ref()))
            .and_then(|line| line.split_whitespace().next())
            .map(|source| strip_dev(source).to_string())
    }

    /// Candidate partitions, sorted by name.
    pub fn devices(&self) -> Result<Vec<StorageDevice>> {
        let root = self.root_device();
        let boot = self.boot_device();

        let mut names: Vec<String> = fs::read_dir(&self.block_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| PARTITION_NAME.is_match(name))
            .collect();
        names.sort();

        let mut devices = Vec::new();
        for name in names {
            let Some(bytes) = self.partition_bytes(&name) else {
                continue;
            };
            let size_gb = bytes as f64 / GIB;
            if size_gb <= MIN_DEVICE_GB {
                debug!("Skipping {} ({:.2}GB)", name, size_gb);
                continue;
            }

            let free = self
                .usage
                .by_device
                .get(&name)
                .copied()
                .or_else(|| if name == root { self.usage.root } else { None })
                .map(|bytes| bytes as f64 / GIB);
            let is_boot = !boot.is_empty() && name.starts_with(&boot);
            devices.push(StorageDevice::new(name, size_gb, free, is_boot));
        }
        Ok(devices)
    }

    fn partition_bytes(&self, name: &str) -> Option<u64> {
        let text = fs::read_to_string(self.block_dir.join(name).join("size")).ok()?;
        let sectors: u64 = text.trim().parse().ok()?;
        let bytes = sectors.checked_mul(SECTOR_BYTES);
        if bytes.is_none() {
            warn!("Ignoring {}: sector count {} out of range", name, sectors);
        }
        bytes
    }

    /// Configured storage partition, else the root partition.
    pub fn selected(&self) -> String {
        self.configured_device()
            .unwrap_or_else(|| self.root_device())
    }

    pub fn actions(&self) -> StorageActions {
        let usb_present = self.dev_dir.join("sda").exists();
        StorageActions::evaluate(
            &self.root_device(),
            &self.platform,
            &self.sub_platform,
            self.last_block,
            usb_present,
        )
    }

    pub fn report(&self) -> Result<StorageReport> {
        Ok(StorageReport {
            devices: self.devices()?,
            selected: self.selected(),
            actions: self.actions(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GB_SECTORS: u64 = 1024 * 1024 * 2;

    fn fixture() -> (TempDir, AdminConfig) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for (name, sectors) in [
            ("mmcblk0", 30 * GB_SECTORS),
            ("mmcblk0p1", GB_SECTORS / 4),
            ("mmcblk0p2", 8 * GB_SECTORS),
            ("mmcblk0boot0", 8192),
            ("sda1", 64 * GB_SECTORS),
            ("loop0", GB_SECTORS),
            ("sdb1", 1000),
        ] {
            let dev = root.join("block").join(name);
            fs::create_dir_all(&dev).unwrap();
            fs::write(dev.join("size"), format!("{}\n", sectors)).unwrap();
        }
        fs::create_dir_all(root.join("dev")).unwrap();
        fs::write(
            root.join("mounts"),
            "/dev/mmcblk0p2 / ext4 rw 0 0\n/dev/mmcblk0p1 /boot/firmware vfat rw 0 0\n",
        )
        .unwrap();
        fs::write(root.join("fstab"), "# static\n/dev/mmcblk0p2 / ext4 defaults 0 1\n").unwrap();

        let config = AdminConfig {
            block_dir: root.join("block"),
            dev_dir: root.join("dev"),
            fstab: root.join("fstab"),
            mounts: root.join("mounts"),
            ..AdminConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn test_base_device() {
        assert_eq!(base_device("mmcblk0p2"), "mmcblk0");
        assert_eq!(base_device("sda1"), "sda");
        assert_eq!(base_device("mmcblk0"), "mmcblk0");
    }

    #[test]
    fn test_devices() {
        let (_dir, config) = fixture();
        let usage = DiskUsage::default()
            .with_device("mmcblk0p1", 512 * 1024 * 1024)
            .with_root(3 * 1024 * 1024 * 1024);
        let inspector = StorageInspector::with_usage(&config, usage);

        let devices = inspector.devices().unwrap();
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["mmcblk0p1", "mmcblk0p2", "sda1"]);

        assert_eq!(devices[1].label, "mmcblk0p2 - 8.0GB (3.0GB Free) (boot device)");
        assert_eq!(devices[2].label, "sda1 - 64.0GB (Not Mounted) (USB)");
        assert!(devices[0].boot);
    }

    #[test]
    fn test_corrupt_sizes_are_skipped() {
        let (dir, config) = fixture();
        let block = dir.path().join("block");
        for (name, size) in [("sdc1", u64::MAX.to_string()), ("sdd1", "garbage".to_string())] {
            fs::create_dir_all(block.join(name)).unwrap();
            fs::write(block.join(name).join("size"), size).unwrap();
        }

        let devices = StorageInspector::with_usage(&config, DiskUsage::default())
            .devices()
            .unwrap();
        let names: Vec<&str> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["mmcblk0p1", "mmcblk0p2", "sda1"]);
    }

    #[test]
    fn test_selection_falls_back_to_root() {
        let (dir, config) = fixture();
        let inspector = StorageInspector::with_usage(&config, DiskUsage::default());
        assert_eq!(inspector.root_device(), "mmcblk0p2");
        assert_eq!(inspector.selected(), "mmcblk0p2");

        fs::write(
            dir.path().join("fstab"),
            "/dev/mmcblk0p2 / ext4 defaults 0 1\n/dev/sda1 /home/fpp/media auto defaults,nofail 0 0\n",
        )
        .unwrap();
        assert_eq!(inspector.selected(), "sda1");
    }

    #[test]
    fn test_report_actions() {
        let (dir, mut config) = fixture();
        config.sub_platform = "Raspberry Pi 4 Model B".to_string();
        config.last_block = Some(7_000_000);
        fs::write(dir.path().join("dev").join("sda"), "").unwrap();

        let report = StorageInspector::with_usage(&config, DiskUsage::default())
            .report()
            .unwrap();
        assert!(report.actions.grow_filesystem);
        assert!(report.actions.flash_usb);
        assert!(!report.actions.flash_emmc);
    }
}
