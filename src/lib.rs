//! Prepare raspios disk images for headless and NFS-root deployments.
//!
//! Partitions inside an image are located with `fdisk`/`partx`, mounted
//! through loop devices and always released again, even when a step fails.
//! On top of that sit two pipelines:
//!
//! - [`prepare_image`] enables ssh, sets the default user's password and
//!   optionally writes wifi credentials, all in place;
//! - [`extract`] copies the boot and root partitions into standalone images
//!   and points the boot partition at an NFS root.

pub mod cli;
pub mod cmd;
pub mod compress;
pub mod config;
pub mod configure;
pub mod disk;
pub mod error;
pub mod extract;
pub mod paths;
pub mod prepare;
pub mod prompt;
pub mod secrets;

#[cfg(test)]
pub(crate) mod testing;

pub use cmd::{Tool, Tools};
pub use config::Settings;
pub use disk::{read_partition_table, with_loop, with_mounted, PartitionTable};
pub use error::{Error, Result};
pub use extract::{copy_boot_for_nfs, copy_partition, copy_root};
pub use prepare::prepare_image;
pub use secrets::{Password, Secrets, WifiCredentials};
