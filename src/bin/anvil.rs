use anyhow::{bail, Result};
use clap::Parser;

use anvil::cli::{self, Cli};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if !nix::unistd::geteuid().is_root() {
        bail!("Root privileges are required to run anvil (try 'sudo')");
    }

    cli::run(cli)
}
