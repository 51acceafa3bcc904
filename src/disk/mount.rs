use std::path::{Path, PathBuf};

use super::partition::read_partition_table;
use crate::cmd::{Tool, Tools};
use crate::error::{Error, Result};

/// Mount the n-th partition of a raw image at `mount_point` through a loop
/// device at the partition's byte offset. The filesystem type is left to
/// mount's auto-detection.
pub fn mount_partition(tools: &Tools, image: &Path, index: usize, mount_point: &Path) -> Result<()> {
    let table = read_partition_table(tools, image)?;
    let partition = table.get(index).ok_or_else(|| {
        Error::MountFailed(format!(
            "{} has {} partitions, cannot mount partition {}",
            image.display(),
            table.len(),
            index
        ))
    })?;

    let options = format!("loop,offset={}", partition.offset()?);
    tools
        .run_output(
            Tool::Mount,
            [
                "-o",
                &*options,
                &*image.to_string_lossy(),
                &*mount_point.to_string_lossy(),
            ],
        )
        .map_err(|e| match e {
            Error::Command { .. } => Error::MountFailed(format!(
                "partition {} of {} at {}: {}",
                index,
                image.display(),
                mount_point.display(),
                e.detail()
            )),
            other => other,
        })?;

    Ok(())
}

pub fn unmount_partition(tools: &Tools, mount_point: &Path) -> Result<()> {
    tools.run_output(Tool::Umount, [&*mount_point.to_string_lossy()])?;
    Ok(())
}

/// A mounted image partition. Unmounts when dropped.
#[derive(Debug)]
pub struct MountGuard<'a> {
    tools: &'a Tools,
    mount_point: PathBuf,
    mounted: bool,
}

impl<'a> MountGuard<'a> {
    pub fn mount(tools: &'a Tools, image: &Path, index: usize, mount_point: &Path) -> Result<Self> {
        mount_partition(tools, image, index, mount_point)?;
        tracing::debug!(
            "Mounted partition {} of {} at {}",
            index,
            image.display(),
            mount_point.display()
        );
        Ok(Self {
            tools,
            mount_point: mount_point.to_path_buf(),
            mounted: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.mount_point
    }

    /// Give up ownership of the mount; it stays mounted after the guard is gone.
    pub fn keep(mut self) -> PathBuf {
        self.mounted = false;
        std::mem::take(&mut self.mount_point)
    }

    fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;

        if let Err(e) = unmount_partition(self.tools, &self.mount_point) {
            tracing::warn!("Failed to unmount {}: {}", self.mount_point.display(), e);
        }
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Mount partition `index` of `image` at `mount_point`, run `f` with the
/// mounted root, and unmount again whatever `f` returned.
pub fn with_mounted<T>(
    tools: &Tools,
    image: &Path,
    index: usize,
    mount_point: &Path,
    f: impl FnOnce(&Path) -> Result<T>,
) -> Result<T> {
    let mut guard = MountGuard::mount(tools, image, index, mount_point)?;
    let result = f(guard.path());
    guard.unmount();
    result
}
