//! Interactive prompts for the command line front end.
//!
//! Hidden input goes through `rpassword`; everything else is read line by
//! line from stdin.

use anyhow::{bail, Context, Result};
use std::io::{self, Write};
use std::path::Path;

use crate::secrets::{Secrets, WPA_PASSPHRASE_LEN};

fn read_line() -> Result<String> {
    io::stdout().flush()?;
    let mut input = String::new();
    let bytes_read = io::stdin().read_line(&mut input)?;

    if bytes_read == 0 {
        bail!("Unexpected end of input. Is stdin connected to a terminal?");
    }

    Ok(input.trim().to_string())
}

pub fn prompt_text(prompt: &str) -> Result<String> {
    print!("{}: ", prompt);
    read_line()
}

/// Ask twice until both entries match. Empty input is refused.
pub fn prompt_password_confirm(prompt: &str) -> Result<String> {
    loop {
        let pass1 = rpassword::prompt_password(format!("{}: ", prompt))
            .context("Failed to read password")?;

        if pass1.is_empty() {
            println!("Password cannot be empty");
            continue;
        }

        let pass2 = rpassword::prompt_password("Again: ").context("Failed to read password")?;

        if pass1 != pass2 {
            println!("Passwords do not match");
            continue;
        }

        return Ok(pass1);
    }
}

pub fn prompt_yes_no(prompt: &str, default: bool) -> Result<bool> {
    let default_str = if default { "Y/n" } else { "y/N" };
    print!("{} [{}]: ", prompt, default_str);
    Ok(parse_yes_no(&read_line()?, default))
}

fn parse_yes_no(input: &str, default: bool) -> bool {
    match input.to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

/// Ask for the new password of `user` and optional wifi credentials.
/// An empty SSID skips wifi configuration.
pub fn prompt_secrets(user: &str) -> Result<Secrets> {
    let password = prompt_password_confirm(&format!("New password for {}", user))?;

    let ssid = prompt_text("WiFi ssid (leave empty to skip)")?;
    let passphrase = if ssid.is_empty() {
        println!("Skipping WiFi configuration");
        None
    } else {
        Some(prompt_wifi_passphrase()?)
    };

    let secrets = Secrets::new(password, Some(ssid.as_str()), passphrase.as_deref())?;
    Ok(secrets)
}

fn prompt_wifi_passphrase() -> Result<String> {
    loop {
        let passphrase = prompt_password_confirm("WiFi password")?;
        if WPA_PASSPHRASE_LEN.contains(&passphrase.len()) {
            return Ok(passphrase);
        }
        println!(
            "WiFi password must be {} to {} characters",
            WPA_PASSPHRASE_LEN.start(),
            WPA_PASSPHRASE_LEN.end()
        );
    }
}

/// `true` when `path` does not exist yet or the user agrees to replace it.
pub fn confirm_overwrite(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    prompt_yes_no(
        &format!("File \"{}\" already exists, overwrite?", path.display()),
        false,
    )
}
