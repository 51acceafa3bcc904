//! Stand-ins for the external tools so pipelines run without root.
//!
//! A fake image keeps each partition's filesystem as a directory
//! (`part-<offset>`) and its raw bytes as a file (`raw-<n>`). `mount` copies
//! the partition directory into the mount point and `umount` copies it back,
//! so edits made while "mounted" persist exactly as they would on a real
//! image.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::cmd::{Tool, Tools};

pub(crate) const BOOT_OFFSET: u64 = 8192 * 512;
pub(crate) const ROOT_OFFSET: u64 = 532_480 * 512;

pub(crate) const SHADOW: &str = "\
root:*:18733:0:99999:7:::
pi:$6$rBoByrWRKMY1EHFy$ho.LISnfm83CLBWBE/yqJ6Lq1TinRlxw:18733:0:99999:7:::
";

pub(crate) struct FakeImage {
    pub dir: TempDir,
    pub image: PathBuf,
    pub mount_point: PathBuf,
}

impl FakeImage {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("2021-05-07-raspios-buster-armhf-lite.img");
        fs::write(&image, b"raw image").unwrap();

        let mount_point = dir.path().join("mnt");
        fs::create_dir(&mount_point).unwrap();
        fs::create_dir(dir.path().join("dev")).unwrap();

        let fake = Self {
            dir,
            image,
            mount_point,
        };

        fs::create_dir(fake.boot()).unwrap();
        fs::write(fake.boot().join("cmdline.txt"), "console=tty1 root=PARTUUID=9730496b-02\n")
            .unwrap();
        fs::create_dir_all(fake.root().join("etc")).unwrap();
        fs::write(fake.root().join("etc/shadow"), SHADOW).unwrap();

        let boot_raw: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();
        let root_raw: Vec<u8> = (0..3 * 4096u32).map(|i| (i % 241) as u8).collect();
        fs::write(fake.dir.path().join("raw-1"), boot_raw).unwrap();
        fs::write(fake.dir.path().join("raw-2"), root_raw).unwrap();

        fake
    }

    /// Filesystem tree of the boot partition
    pub fn boot(&self) -> PathBuf {
        self.dir.path().join(format!("part-{}", BOOT_OFFSET))
    }

    /// Filesystem tree of the root partition
    pub fn root(&self) -> PathBuf {
        self.dir.path().join(format!("part-{}", ROOT_OFFSET))
    }

    pub fn raw(&self, n: usize) -> PathBuf {
        self.dir.path().join(format!("raw-{}", n))
    }

    pub fn is_mounted(&self) -> bool {
        self.dir.path().join("mounted").exists()
    }

    pub fn loop_attached(&self) -> bool {
        self.dir.path().join("dev/loop0").exists()
    }

    /// Every tool invocation, one line each
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn tools(&self) -> Tools {
        let d = self.dir.path().display();
        let log = format!("echo \"$0 $*\" >> '{d}/calls.log'");

        Tools::default()
            .stub(
                Tool::Fdisk,
                "echo 'Units: sectors of 1 * 512 = 512 bytes'; echo; echo ' Start'",
            )
            .stub(Tool::Partx, "printf '  8192  524288\\n532480 3104768\\n'")
            .stub(
                Tool::Mount,
                &format!(
                    "{log}; [ -e '{d}/mounted' ] && exit 32; off=${{2#loop,offset=}}; \
                     [ -d \"{d}/part-$off\" ] || exit 32; \
                     cp -a \"{d}/part-$off/.\" \"$4/\" && echo \"$off\" > '{d}/mounted'"
                ),
            )
            .stub(
                Tool::Umount,
                &format!(
                    "{log}; off=$(cat '{d}/mounted') || exit 32; \
                     rm -rf \"{d}/part-$off\" && cp -a \"$1\" \"{d}/part-$off\" && \
                     rm -rf \"$1\" && mkdir \"$1\" && rm '{d}/mounted'"
                ),
            )
            .stub(
                Tool::Losetup,
                &format!(
                    "{log}; if [ \"$1\" = -d ]; then rm -f \"$2\" \"$2\"p*; \
                     else cp '{d}/raw-1' '{d}/dev/loop0p1' && cp '{d}/raw-2' '{d}/dev/loop0p2' && \
                     touch '{d}/dev/loop0' && echo '{d}/dev/loop0'; fi"
                ),
            )
            .stub(
                Tool::Dd,
                &format!(
                    "{log}; for a; do case $a in if=*) src=${{a#if=}};; of=*) dst=${{a#of=}};; esac; done; \
                     cat \"$src\" > \"$dst\""
                ),
            )
            .stub(
                Tool::Openssl,
                &format!("{log}; read pw; echo \"\\$6\\$fakesalt\\$$(printf %s \"$pw\" | od -An -tx1 | tr -d ' \\n')\""),
            )
            .stub(
                Tool::WpaPassphrase,
                &format!(
                    "{log}; read pass; echo '# reading passphrase from stdin'; \
                     printf 'network={{\\n\\tssid=\"%s\"\\n\\t#psk=\"%s\"\\n\\tpsk=0123abcd\\n}}\\n' \"$1\" \"$pass\""
                ),
            )
    }
}

pub(crate) fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
