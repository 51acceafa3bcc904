//! Split a raspios image into standalone partition images for an NFS root
//! setup.

use std::path::{Path, PathBuf};

use crate::cmd::{Tool, Tools};
use crate::config::Settings;
use crate::configure;
use crate::disk::{with_loop, with_mounted};
use crate::error::{Error, Result};
use crate::paths;

/// Tools needed by the extraction functions
pub const REQUIRED_TOOLS: &[Tool] = &[
    Tool::Fdisk,
    Tool::Partx,
    Tool::Losetup,
    Tool::Mount,
    Tool::Umount,
    Tool::Dd,
];

/// Insert `suffix` before the first `.` of the file name:
/// `raspios.img` -> `raspios_nfsroot.img`.
pub fn derived_image_path(image: &Path, suffix: &str) -> PathBuf {
    let name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let derived = match name.find('.') {
        Some(dot) => format!("{}{}{}", &name[..dot], suffix, &name[dot..]),
        None => format!("{}{}", name, suffix),
    };

    image.with_file_name(derived)
}

pub fn nfs_boot_image_path(image: &Path) -> PathBuf {
    derived_image_path(image, "_nfsboot")
}

pub fn nfs_root_image_path(image: &Path) -> PathBuf {
    derived_image_path(image, "_nfsroot")
}

/// Copy the raw bytes of partition `index` of `image` into `dest`.
///
/// `dest` is overwritten if it exists; asking the user first is up to the
/// caller.
pub fn copy_partition(
    tools: &Tools,
    image: &Path,
    index: usize,
    dest: &Path,
    progress: bool,
) -> Result<PathBuf> {
    if dest == image {
        return Err(Error::CopyFailed(format!(
            "refusing to copy {} onto itself",
            image.display()
        )));
    }

    with_loop(tools, image, |partitions| {
        let device = partitions.get(index).ok_or(Error::NoSuchPartition {
            index,
            count: partitions.len(),
        })?;

        tracing::info!(
            "Copying partition {} ({}) to {}",
            index,
            device.display(),
            dest.display()
        );

        let input = format!("if={}", device.display());
        let output = format!("of={}", dest.display());
        let status = if progress { "status=progress" } else { "status=none" };
        tools
            .run(Tool::Dd, [input.as_str(), output.as_str(), "bs=4M", "conv=fsync", status])
            .map_err(|e| match e {
                Error::Command { .. } => Error::CopyFailed(format!(
                    "{} -> {}: {}",
                    device.display(),
                    dest.display(),
                    e
                )),
                other => other,
            })
    })?;

    Ok(dest.to_path_buf())
}

/// Create a separate image file containing only the boot partition and
/// configure boot options for a remote root filesystem via NFS.
///
/// The copy is taken first; the NFS boot parameters are then written to the
/// boot partition of the ORIGINAL `image`, which is modified in place. The
/// new image can be written over the boot partition of a running raspberry
/// (/dev/mmcblk0p1); after a reboot it stops using its SD card root in favor
/// of the NFS root at `nfs_root`, e.g. `192.168.0.1:/srv/raspios-root`.
///
/// Returns the path of the new boot image.
pub fn copy_boot_for_nfs(
    tools: &Tools,
    settings: &Settings,
    image: &Path,
    dest: &Path,
    nfs_root: &str,
) -> Result<PathBuf> {
    copy_partition(tools, image, paths::BOOT_PARTITION, dest, settings.progress)?;

    with_mounted(
        tools,
        image,
        paths::BOOT_PARTITION,
        &settings.mount_point,
        |boot| configure::configure_nfs_root(boot, nfs_root),
    )?;

    Ok(dest.to_path_buf())
}

/// Create a separate image containing only the root filesystem partition.
///
/// The copy is meant to be served by the NFS server as the raspberry's root.
/// Make a fresh copy for every install, since the raspberry writes to it.
pub fn copy_root(tools: &Tools, settings: &Settings, image: &Path, dest: &Path) -> Result<PathBuf> {
    copy_partition(tools, image, paths::ROOT_PARTITION, dest, settings.progress)
}
