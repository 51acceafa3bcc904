use std::fs;
use std::path::Path;

use crate::cmd::{Tool, Tools};
use crate::error::{Error, Result};
use crate::paths;
use crate::secrets::WifiCredentials;

const CTRL_INTERFACE: &str = "ctrl_interface=/var/run/wpa_supplicant";

/// [Boot partition] Configure wifi network credentials.
///
/// Returns `Ok(false)` without touching the partition when neither SSID nor
/// passphrase is given. Exactly one of them is a `Config` error, raised
/// before anything is written.
pub fn configure_wifi(
    tools: &Tools,
    root: &Path,
    country: &str,
    ssid: Option<&str>,
    passphrase: Option<&str>,
) -> Result<bool> {
    match WifiCredentials::from_parts(ssid, passphrase)? {
        Some(creds) => {
            write_wifi(tools, root, country, &creds)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Derive the network block with `wpa_passphrase` and write
/// `wpa_supplicant.conf`, replacing any previous content.
pub fn write_wifi(tools: &Tools, root: &Path, country: &str, creds: &WifiCredentials) -> Result<()> {
    let input = format!("{}\n", creds.passphrase.expose());
    let derived = tools
        .run_with_stdin(Tool::WpaPassphrase, [creds.ssid.as_str()], input.as_bytes())
        .map_err(|e| match e {
            Error::Command { .. } => Error::Config(format!(
                "wpa_passphrase rejected the credentials for '{}': {}",
                creds.ssid,
                e.detail()
            )),
            other => other,
        })?;

    fs::write(
        root.join(paths::WPA_SUPPLICANT_CONF),
        render_wpa_supplicant(country, &derived),
    )?;

    Ok(())
}

/// Build `wpa_supplicant.conf` from `wpa_passphrase` output. Comment lines
/// are dropped, which removes the plaintext `#psk=` line.
pub fn render_wpa_supplicant(country: &str, derived: &str) -> String {
    let country_line = format!("country={}", country);
    let mut out = String::new();

    for line in [country_line.as_str(), CTRL_INTERFACE]
        .into_iter()
        .chain(derived.lines())
        .filter(|line| !line.trim_start().starts_with('#'))
    {
        out.push_str(line);
        out.push('\n');
    }

    out
}
