//! In-memory credentials for one run.
//!
//! Nothing here is ever written to disk unhashed or passed on a command line;
//! `Debug` output is redacted.

use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{Error, Result};

/// A secret string that never shows up in debug output or logs
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Accepted WPA passphrase length in bytes. `wpa_passphrase` truncates longer
/// input read from stdin instead of rejecting it.
pub const WPA_PASSPHRASE_LEN: RangeInclusive<usize> = 8..=63;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: String,
    pub passphrase: Password,
}

impl WifiCredentials {
    /// Pair up an optional SSID and passphrase. Empty strings count as absent.
    ///
    /// Both absent is `Ok(None)`; exactly one present, or a passphrase
    /// outside [`WPA_PASSPHRASE_LEN`], is a `Config` error.
    pub fn from_parts(ssid: Option<&str>, passphrase: Option<&str>) -> Result<Option<Self>> {
        let ssid = ssid.filter(|s| !s.is_empty());
        let passphrase = passphrase.filter(|p| !p.is_empty());

        match (ssid, passphrase) {
            (Some(_), Some(passphrase)) if !WPA_PASSPHRASE_LEN.contains(&passphrase.len()) => {
                Err(Error::Config(format!(
                    "Wifi passphrase must be {} to {} characters, got {}",
                    WPA_PASSPHRASE_LEN.start(),
                    WPA_PASSPHRASE_LEN.end(),
                    passphrase.len()
                )))
            }
            (Some(ssid), Some(passphrase)) => Ok(Some(Self {
                ssid: ssid.to_string(),
                passphrase: Password::new(passphrase),
            })),
            (None, None) => Ok(None),
            _ => Err(Error::Config(
                "Specify both wifi ssid and wifi passphrase (or neither)".into(),
            )),
        }
    }
}

/// Secrets applied by image preparation.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub user_password: Password,
    pub wifi: Option<WifiCredentials>,
}

impl Secrets {
    pub fn new(
        user_password: impl Into<String>,
        wifi_ssid: Option<&str>,
        wifi_passphrase: Option<&str>,
    ) -> Result<Self> {
        let user_password = Password::new(user_password);
        if user_password.is_empty() {
            return Err(Error::Config("User password cannot be empty".into()));
        }

        Ok(Self {
            user_password,
            wifi: WifiCredentials::from_parts(wifi_ssid, wifi_passphrase)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let secrets = Secrets::new("raspberry2", Some("home"), Some("hunter22")).unwrap();
        let debug = format!("{:?}", secrets);
        assert!(!debug.contains("raspberry2"));
        assert!(!debug.contains("hunter22"));
        assert!(debug.contains("home"));
    }

    #[test]
    fn wifi_both_or_neither() {
        assert!(WifiCredentials::from_parts(None, None).unwrap().is_none());
        assert!(WifiCredentials::from_parts(Some(""), Some("")).unwrap().is_none());

        let creds = WifiCredentials::from_parts(Some("home"), Some("hunter22"))
            .unwrap()
            .unwrap();
        assert_eq!(creds.ssid, "home");
        assert_eq!(creds.passphrase.expose(), "hunter22");
    }

    #[test]
    fn wifi_half_pair_is_config_error() {
        assert!(matches!(
            WifiCredentials::from_parts(Some("home"), None),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            WifiCredentials::from_parts(Some(""), Some("hunter22")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn wifi_passphrase_length_is_checked() {
        for passphrase in ["short", &"a".repeat(64), &"a".repeat(70)] {
            assert!(matches!(
                WifiCredentials::from_parts(Some("home"), Some(passphrase)),
                Err(Error::Config(_))
            ));
        }
        assert!(WifiCredentials::from_parts(Some("home"), Some("12345678")).is_ok());
        assert!(WifiCredentials::from_parts(Some("home"), Some(&"a".repeat(63))).is_ok());
    }

    #[test]
    fn empty_user_password_rejected() {
        assert!(matches!(Secrets::new("", None, None), Err(Error::Config(_))));
    }
}
