use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

use crate::cmd::{Tool, Tools};
use crate::error::{Error, Result};
use crate::paths;

/// One partition as reported by the partition-table inspector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// 0-based position in the inspector's report
    pub index: usize,
    pub start_sector: u64,
    pub sectors: Option<u64>,
    pub sector_size: u64,
}

impl Partition {
    /// Byte offset from the start of the image
    pub fn offset(&self) -> Result<u64> {
        self.start_sector.checked_mul(self.sector_size).ok_or_else(|| {
            Error::Parse(format!(
                "offset of partition {} overflows: {} sectors of {} bytes",
                self.index, self.start_sector, self.sector_size
            ))
        })
    }

    /// `None` when the size is unknown or does not fit in a `u64`
    pub fn size_bytes(&self) -> Option<u64> {
        self.sectors.and_then(|s| s.checked_mul(self.sector_size))
    }
}

/// Partitions of an image, in the order the inspector reported them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    pub sector_size: u64,
    partitions: Vec<Partition>,
}

impl PartitionTable {
    /// Build a table from `fdisk -l -o Start` and `partx -sgo START,SECTORS`
    /// output.
    pub fn from_reports(fdisk: &str, partx: &str) -> Result<Self> {
        let sector_size = parse_sector_size(fdisk).unwrap_or(paths::DEFAULT_SECTOR_SIZE);
        let partitions = parse_partx_rows(partx, sector_size)?;
        Ok(Self {
            sector_size,
            partitions,
        })
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Partition> {
        self.partitions.get(index)
    }

    pub fn offsets(&self) -> Result<Vec<u64>> {
        self.partitions.iter().map(Partition::offset).collect()
    }
}

/// Read the partition table of a raw image.
pub fn read_partition_table(tools: &Tools, image: &Path) -> Result<PartitionTable> {
    check_image(image)?;
    let image_str = image.to_string_lossy();

    let fdisk = tools
        .run_output(Tool::Fdisk, ["-l", "-o", "Start", &*image_str])
        .map_err(|e| invalid_image(image, e))?;
    let partx = tools
        .run_output(Tool::Partx, ["-s", "-g", "-o", "START,SECTORS", &*image_str])
        .map_err(|e| invalid_image(image, e))?;

    let table = PartitionTable::from_reports(&fdisk, &partx)?;
    if table.is_empty() {
        return Err(Error::InvalidImage {
            image: image.to_path_buf(),
            reason: "no partitions found".into(),
        });
    }

    tracing::debug!(
        "{}: {} partitions, sector size {}, offsets {:?}",
        image.display(),
        table.len(),
        table.sector_size,
        table.offsets()?
    );

    Ok(table)
}

fn check_image(image: &Path) -> Result<()> {
    let metadata = fs::metadata(image).map_err(|e| Error::InvalidImage {
        image: image.to_path_buf(),
        reason: e.to_string(),
    })?;

    let file_type = metadata.file_type();
    if !file_type.is_file() && !file_type.is_block_device() {
        return Err(Error::InvalidImage {
            image: image.to_path_buf(),
            reason: "not a regular file or block device".into(),
        });
    }

    Ok(())
}

fn invalid_image(image: &Path, err: Error) -> Error {
    match err {
        Error::Command { .. } => Error::InvalidImage {
            image: image.to_path_buf(),
            reason: err.detail(),
        },
        other => other,
    }
}

/// Extract the sector size from an fdisk line such as
/// `Units: sectors of 1 * 512 = 512 bytes`.
pub fn parse_sector_size(fdisk: &str) -> Option<u64> {
    fdisk.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Units: sectors of ")?;
        let (expr, result) = rest.split_once(" = ")?;
        if expr.is_empty()
            || !expr
                .chars()
                .all(|c| c.is_ascii_digit() || c == '*' || c.is_whitespace())
        {
            return None;
        }
        result.strip_suffix(" bytes")?.trim().parse().ok()
    })
}

/// Parse `partx -g -o START,SECTORS` rows. The SECTORS column is optional so
/// `-o START` output parses as well. A row whose byte offset does not fit in
/// a `u64` is a parse error.
pub fn parse_partx_rows(partx: &str, sector_size: u64) -> Result<Vec<Partition>> {
    partx
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            let mut fields = line.split_whitespace();
            let start_sector = fields
                .next()
                .and_then(|f| f.parse::<u64>().ok())
                .ok_or_else(|| Error::Parse(format!("no start sector in row '{}'", line)))?;
            let sectors = match fields.next() {
                Some(f) => Some(f.parse::<u64>().map_err(|_| {
                    Error::Parse(format!("invalid sector count '{}' in row '{}'", f, line))
                })?),
                None => None,
            };

            let partition = Partition {
                index,
                start_sector,
                sectors,
                sector_size,
            };
            partition.offset()?;
            Ok(partition)
        })
        .collect()
}
