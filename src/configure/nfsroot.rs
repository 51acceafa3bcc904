use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::paths;

/// [Boot partition] Boot with the root filesystem mounted over NFS.
///
/// `cmdline.txt` is replaced as a whole, the previous parameters are not
/// merged.
pub fn configure_nfs_root(root: &Path, nfs_root_address: &str) -> Result<()> {
    fs::write(root.join(paths::CMDLINE_TXT), nfs_cmdline(nfs_root_address))?;
    Ok(())
}

/// Kernel command line for an NFS root at `address` (`host:/path`).
pub fn nfs_cmdline(address: &str) -> String {
    let params = [
        "console=serial0,115200".to_string(),
        "console=tty1".to_string(),
        "root=/dev/nfs".to_string(),
        "rootfstype=nfs".to_string(),
        format!("nfsroot={}", address),
        "ip=dhcp".to_string(),
    ];
    format!("{}\n", params.join(" "))
}

/// Whether `address` looks like `host:/path/to/root`.
pub fn is_plausible_nfs_address(address: &str) -> bool {
    let Some((host, path)) = address.split_once(':') else {
        return false;
    };

    let host_ok = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    let path_ok = path.starts_with('/')
        && path
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'));

    host_ok && path_ok
}
