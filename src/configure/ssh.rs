use std::fs::File;
use std::path::Path;

use crate::error::Result;
use crate::paths;

/// [Boot partition] Enable the ssh server at next boot.
///
/// raspios starts sshd when an `ssh` file exists on the boot partition.
/// The marker is recreated empty, so repeated calls leave the same state.
pub fn enable_ssh(root: &Path) -> Result<()> {
    File::create(root.join(paths::SSH_MARKER))?;
    Ok(())
}
