/// Default mount point for image partitions
pub const MOUNT_TARGET: &str = "/mnt";

/// Index of the boot (firmware) partition in a raspios image
pub const BOOT_PARTITION: usize = 0;

/// Index of the root filesystem partition in a raspios image
pub const ROOT_PARTITION: usize = 1;

/// Marker file on the boot partition that enables sshd at first boot
pub const SSH_MARKER: &str = "ssh";

/// Wifi configuration picked up from the boot partition at first boot
pub const WPA_SUPPLICANT_CONF: &str = "wpa_supplicant.conf";

/// Kernel command line on the boot partition
pub const CMDLINE_TXT: &str = "cmdline.txt";

/// Shadow password file, relative to the root partition
pub const SHADOW: &str = "etc/shadow";

/// Default user of raspios images
pub const DEFAULT_USER: &str = "pi";

/// Default wifi regulatory domain (ISO 3166 country code)
pub const DEFAULT_WIFI_COUNTRY: &str = "CZ";

/// Sector size assumed when fdisk does not report one
pub const DEFAULT_SECTOR_SIZE: u64 = 512;
