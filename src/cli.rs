//! Command line front end: argument parsing, prompts and mode dispatch.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cmd::{Tool, Tools};
use crate::compress;
use crate::config::Settings;
use crate::configure::is_plausible_nfs_address;
use crate::disk::MountGuard;
use crate::extract;
use crate::prepare;
use crate::prompt;

/// Prepare a custom RaspiOS image by modifying the original one in place.
///
/// Original images are available at
/// https://downloads.raspberrypi.org/raspios_lite_armhf/images/
///
/// Run again with --nfs to create copies of the boot and root partitions as
/// separate images. Use these to set up a raspberry with a remote root
/// filesystem served by an NFS server.
#[derive(Debug, Parser)]
#[command(name = "anvil", version)]
pub struct Cli {
    /// Path to the original raspios image (*.img)
    pub image: PathBuf,

    /// Address of the remote root filesystem on an NFS server, e.g.
    /// "192.168.0.1:/srv/raspios-root". Creates two separate images (boot
    /// and root partition) instead of modifying the image.
    #[arg(long, value_name = "HOST:/PATH", conflicts_with = "only_mount")]
    pub nfs: Option<String>,

    /// Compress the final image(s)
    #[arg(long)]
    pub zip: bool,

    /// With --zip, keep the uncompressed image(s) as well
    #[arg(long, requires = "zip")]
    pub keep_unzipped: bool,

    /// Do not modify anything, only mount the partition with this index
    #[arg(long, value_name = "INDEX", conflicts_with_all = ["zip", "keep_unzipped"])]
    pub only_mount: Option<usize>,

    /// TOML settings file (mount point, user, wifi country, progress)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// What a run does, derived from the flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Prepare,
    Extract { nfs_root: String },
    MountOnly { index: usize },
}

impl Cli {
    pub fn mode(&self) -> Mode {
        match (&self.nfs, self.only_mount) {
            (_, Some(index)) => Mode::MountOnly { index },
            (Some(nfs_root), None) => Mode::Extract {
                nfs_root: nfs_root.clone(),
            },
            (None, None) => Mode::Prepare,
        }
    }

    /// Every external tool the selected mode can reach
    pub fn required_tools(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = match self.mode() {
            Mode::Prepare => prepare::REQUIRED_TOOLS.to_vec(),
            Mode::Extract { .. } => extract::REQUIRED_TOOLS.to_vec(),
            Mode::MountOnly { .. } => vec![Tool::Fdisk, Tool::Partx, Tool::Mount],
        };
        if self.zip {
            tools.push(Tool::Zip);
        }
        tools
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let tools = Tools::locate(&cli.required_tools())?;

    match cli.mode() {
        Mode::MountOnly { index } => mount_only(&tools, &settings, &cli.image, index),
        Mode::Prepare => {
            println!("Configuring {}", cli.image.display());
            let secrets = prompt::prompt_secrets(&settings.user)?;
            let image = prepare::prepare_image(&tools, &settings, &cli.image, &secrets)
                .with_context(|| format!("Failed to prepare {}", cli.image.display()))?;
            println!("Success, {}", image.display());

            if cli.zip {
                compress_image(&tools, &image, cli.keep_unzipped)?;
            }
            Ok(())
        }
        Mode::Extract { nfs_root } => {
            let boot = extract::nfs_boot_image_path(&cli.image);
            let root = extract::nfs_root_image_path(&cli.image);
            for path in [&boot, &root] {
                if !prompt::confirm_overwrite(path)? {
                    bail!("No overwrite, exiting...");
                }
            }

            if !is_plausible_nfs_address(&nfs_root)
                && !prompt::prompt_yes_no(
                    &format!(
                        "\"{}\" does not seem to be a valid NFS path in format \
                         \"host:/path/to/root\". Continue anyway?",
                        nfs_root
                    ),
                    false,
                )?
            {
                bail!("Invalid NFS path, exiting...");
            }

            println!("Extracting partitions from {}", cli.image.display());
            let boot = extract::copy_boot_for_nfs(&tools, &settings, &cli.image, &boot, &nfs_root)
                .context("Failed to extract the boot partition")?;
            println!("Success, {}", boot.display());
            let root = extract::copy_root(&tools, &settings, &cli.image, &root)
                .context("Failed to extract the root partition")?;
            println!("Success, {}", root.display());

            if cli.zip {
                compress_image(&tools, &boot, cli.keep_unzipped)?;
                compress_image(&tools, &root, cli.keep_unzipped)?;
            }
            Ok(())
        }
    }
}

fn mount_only(tools: &Tools, settings: &Settings, image: &Path, index: usize) -> Result<()> {
    let path = MountGuard::mount(tools, image, index, &settings.mount_point)
        .with_context(|| format!("Failed to mount partition {} of {}", index, image.display()))?
        .keep();
    println!(
        "Mounted \"{}\" to \"{}\". Unmount with:\n  sudo umount {}",
        image.display(),
        path.display(),
        path.display()
    );
    Ok(())
}

/// Zip `image`, then delete it unless `keep_unzipped` is set or the user
/// asks to keep it. A refused archive overwrite skips the image.
fn compress_image(tools: &Tools, image: &Path, keep_unzipped: bool) -> Result<()> {
    let archive = compress::zip_path(image);
    if !prompt::confirm_overwrite(&archive)? {
        println!("Skipped compressing {}", image.display());
        return Ok(());
    }
    if archive.exists() {
        // zip would add to the old archive instead of replacing it
        fs::remove_file(&archive)
            .with_context(|| format!("Failed to remove {}", archive.display()))?;
    }

    println!("Compressing {}...", image.display());
    let archive = compress::compress(tools, image)?;
    println!("Compressed, {}", archive.display());

    let keep = keep_unzipped || prompt::prompt_yes_no("Keep the uncompressed copy?", false)?;
    if !keep {
        fs::remove_file(image).with_context(|| format!("Failed to remove {}", image.display()))?;
    }
    Ok(())
}
