use std::fs;
use std::path::{Path, PathBuf};

use crate::cmd::{Tool, Tools};
use crate::error::{Error, Result};

/// A partition-scanned loop device attached to an image. Detaches when dropped.
#[derive(Debug)]
pub struct LoopMapping<'a> {
    tools: &'a Tools,
    device: PathBuf,
    partitions: Vec<PathBuf>,
    attached: bool,
}

impl<'a> LoopMapping<'a> {
    /// `losetup --show -P -f <image>`: attach the image to the first free
    /// loop device and let the kernel expose each partition as `<device>pN`.
    pub fn attach(tools: &'a Tools, image: &Path) -> Result<Self> {
        let device = tools
            .run_output(
                Tool::Losetup,
                ["--show", "-P", "-f", &*image.to_string_lossy()],
            )
            .map_err(|e| match e {
                Error::Command { .. } => Error::MappingFailed(format!(
                    "cannot attach {}: {}",
                    image.display(),
                    e.detail()
                )),
                other => other,
            })?;

        if device.is_empty() {
            return Err(Error::MappingFailed(format!(
                "losetup returned no device for {}",
                image.display()
            )));
        }

        let mut mapping = Self {
            tools,
            device: PathBuf::from(device),
            partitions: Vec::new(),
            attached: true,
        };

        // Dropping `mapping` on error detaches the device again.
        mapping.partitions = partition_devices(&mapping.device)?;
        if mapping.partitions.is_empty() {
            return Err(Error::MappingFailed(format!(
                "{} exposes no partitions of {}",
                mapping.device.display(),
                image.display()
            )));
        }

        tracing::debug!(
            "Attached {} to {} ({} partitions)",
            image.display(),
            mapping.device.display(),
            mapping.partitions.len()
        );

        Ok(mapping)
    }

    pub fn device(&self) -> &Path {
        &self.device
    }

    /// Partition devices, in partition table order
    pub fn partitions(&self) -> &[PathBuf] {
        &self.partitions
    }

    /// Detach the loop device, reporting failure to the caller.
    pub fn detach(mut self) -> Result<()> {
        self.attached = false;
        self.tools
            .run_output(Tool::Losetup, ["-d", &*self.device.to_string_lossy()])
            .map_err(|e| match e {
                Error::Command { .. } => Error::MappingFailed(format!(
                    "cannot detach {}: {}",
                    self.device.display(),
                    e.detail()
                )),
                other => other,
            })?;
        Ok(())
    }
}

impl Drop for LoopMapping<'_> {
    fn drop(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;

        if let Err(e) = self
            .tools
            .run_output(Tool::Losetup, ["-d", &*self.device.to_string_lossy()])
        {
            tracing::warn!("Failed to detach {}: {}", self.device.display(), e);
        }
    }
}

/// Attach `image`, run `f` with its partition devices, then detach.
///
/// If `f` fails, its error is returned and a detach failure is only logged.
/// If `f` succeeds, a detach failure is returned as `MappingFailed`.
pub fn with_loop<T>(
    tools: &Tools,
    image: &Path,
    f: impl FnOnce(&[PathBuf]) -> Result<T>,
) -> Result<T> {
    let mapping = LoopMapping::attach(tools, image)?;
    match f(mapping.partitions()) {
        Ok(value) => {
            mapping.detach()?;
            Ok(value)
        }
        Err(e) => {
            drop(mapping);
            Err(e)
        }
    }
}

/// Find `<device>p<N>` entries next to `device`, ordered by N.
fn partition_devices(device: &Path) -> Result<Vec<PathBuf>> {
    let dir = device.parent().unwrap_or_else(|| Path::new("/"));
    let prefix = match device.file_name() {
        Some(name) => format!("{}p", name.to_string_lossy()),
        None => {
            return Err(Error::MappingFailed(format!(
                "unexpected loop device path {}",
                device.display()
            )))
        }
    };

    let mut numbered = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(n) = name
            .strip_prefix(&prefix)
            .and_then(|suffix| suffix.parse::<u32>().ok())
        {
            numbered.push((n, entry.path()));
        }
    }

    numbered.sort_by_key(|(n, _)| *n);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}
