//! In-place preparation of a raspios image.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::cmd::{Tool, Tools};
use crate::config::Settings;
use crate::configure;
use crate::disk::with_mounted;
use crate::error::Result;
use crate::paths;
use crate::secrets::Secrets;

/// Tools needed by [`prepare_image`]
pub const REQUIRED_TOOLS: &[Tool] = &[
    Tool::Fdisk,
    Tool::Partx,
    Tool::Mount,
    Tool::Umount,
    Tool::Openssl,
    Tool::WpaPassphrase,
];

/// Progress of a preparation run. The boot partition is always unmounted
/// before the root partition is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BootMounted,
    SshEnabled,
    WifiConfigured,
    BootUnmounted,
    RootMounted,
    PasswordSet,
    RootUnmounted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::BootMounted => "boot partition mounted",
            Stage::SshEnabled => "ssh enabled",
            Stage::WifiConfigured => "wifi configured",
            Stage::BootUnmounted => "boot partition unmounted",
            Stage::RootMounted => "root partition mounted",
            Stage::PasswordSet => "password set",
            Stage::RootUnmounted => "root partition unmounted",
        };
        f.write_str(name)
    }
}

fn reached(stage: Stage) {
    tracing::info!("{}", stage);
}

/// Modify several fundamental settings in the raspios image:
///   - enable ssh
///   - change the default user's password
///   - (optional) set wifi credentials
///
/// The image file is modified IN PLACE. A failure stops the remaining steps
/// but does not undo the ones already written.
///
/// Returns the path of the modified image.
pub fn prepare_image(
    tools: &Tools,
    settings: &Settings,
    image: &Path,
    secrets: &Secrets,
) -> Result<PathBuf> {
    let mount_point = settings.mount_point.as_path();

    with_mounted(tools, image, paths::BOOT_PARTITION, mount_point, |boot| {
        reached(Stage::BootMounted);
        configure::enable_ssh(boot)?;
        reached(Stage::SshEnabled);
        if let Some(wifi) = &secrets.wifi {
            configure::write_wifi(tools, boot, &settings.wifi_country, wifi)?;
            reached(Stage::WifiConfigured);
        }
        Ok(())
    })?;
    reached(Stage::BootUnmounted);

    with_mounted(tools, image, paths::ROOT_PARTITION, mount_point, |root| {
        reached(Stage::RootMounted);
        configure::set_user_password(tools, root, &settings.user, &secrets.user_password)?;
        reached(Stage::PasswordSet);
        Ok(())
    })?;
    reached(Stage::RootUnmounted);

    Ok(image.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{read, FakeImage, SHADOW};

    fn settings(fake: &FakeImage) -> Settings {
        Settings {
            mount_point: fake.mount_point.clone(),
            ..Settings::default()
        }
    }

    #[test]
    fn prepares_without_wifi() {
        let fake = FakeImage::new();
        let secrets = Secrets::new("raspberry2", None, None).unwrap();

        let out = prepare_image(&fake.tools(), &settings(&fake), &fake.image, &secrets).unwrap();
        assert_eq!(out, fake.image);

        let ssh = std::fs::metadata(fake.boot().join("ssh")).unwrap();
        assert_eq!(ssh.len(), 0);
        assert!(!fake.boot().join("wpa_supplicant.conf").exists());

        // hex of "raspberry2"
        let shadow = read(&fake.root().join("etc/shadow"));
        assert_eq!(
            shadow,
            "root:*:18733:0:99999:7:::\n\
             pi:$6$fakesalt$72617370626572727932:18733:0:99999:7:::\n"
        );
        assert!(!fake.is_mounted());
    }

    #[test]
    fn prepares_with_wifi() {
        let fake = FakeImage::new();
        let secrets = Secrets::new("raspberry2", Some("home"), Some("hunter22")).unwrap();

        prepare_image(&fake.tools(), &settings(&fake), &fake.image, &secrets).unwrap();

        let conf = read(&fake.boot().join("wpa_supplicant.conf"));
        assert_eq!(
            conf,
            "country=CZ\n\
             ctrl_interface=/var/run/wpa_supplicant\n\
             network={\n\
             \tssid=\"home\"\n\
             \tpsk=0123abcd\n\
             }\n"
        );
    }

    #[test]
    fn boot_scope_closes_before_root_scope_opens() {
        let fake = FakeImage::new();
        let secrets = Secrets::new("raspberry2", None, None).unwrap();
        prepare_image(&fake.tools(), &settings(&fake), &fake.image, &secrets).unwrap();

        let order: Vec<String> = fake
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("mount") || c.starts_with("umount"))
            .map(|c| c.split(' ').take(3).collect::<Vec<_>>().join(" "))
            .collect();
        assert_eq!(
            order,
            vec![
                format!("mount -o loop,offset={}", crate::testing::BOOT_OFFSET),
                format!("umount {}", fake.mount_point.display()),
                format!("mount -o loop,offset={}", crate::testing::ROOT_OFFSET),
                format!("umount {}", fake.mount_point.display()),
            ]
        );
    }

    #[test]
    fn secrets_never_reach_the_command_line() {
        let fake = FakeImage::new();
        let secrets = Secrets::new("raspberry2", Some("home"), Some("hunter22")).unwrap();
        prepare_image(&fake.tools(), &settings(&fake), &fake.image, &secrets).unwrap();

        let calls = fake.calls().join("\n");
        assert!(!calls.contains("raspberry2"));
        assert!(!calls.contains("hunter22"));
    }

    #[test]
    fn missing_user_fails_after_boot_changes() {
        let fake = FakeImage::new();
        let secrets = Secrets::new("raspberry2", None, None).unwrap();
        let settings = Settings {
            user: "alice".into(),
            ..settings(&fake)
        };

        let err = prepare_image(&fake.tools(), &settings, &fake.image, &secrets).unwrap_err();
        assert!(matches!(err, Error::UserNotFound { .. }));

        // Not transactional: the boot partition keeps its changes
        assert!(fake.boot().join("ssh").exists());
        assert_eq!(read(&fake.root().join("etc/shadow")), SHADOW);
        assert!(!fake.is_mounted());
    }

    #[test]
    fn wifi_failure_still_unmounts_and_skips_root() {
        let fake = FakeImage::new();
        let secrets = Secrets::new("raspberry2", Some("home"), Some("hunter22")).unwrap();
        let tools = fake
            .tools()
            .stub(Tool::WpaPassphrase, "echo 'wpa_passphrase: out of memory' >&2; exit 1");

        let err = prepare_image(&tools, &settings(&fake), &fake.image, &secrets).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!fake.is_mounted());
        assert!(!fake.boot().join("wpa_supplicant.conf").exists());
        assert_eq!(read(&fake.root().join("etc/shadow")), SHADOW);
    }
}
