use std::fs;
use std::path::Path;

use crate::cmd::{Tool, Tools};
use crate::error::{Error, Result};
use crate::paths;
use crate::secrets::Password;

/// [Root partition] Change the password of `user` in `etc/shadow`.
///
/// Only the hash field of the first line for `user` changes; every other byte
/// of the file is kept. Fails with `UserNotFound`, leaving the file alone,
/// when no line belongs to `user`.
pub fn set_user_password(tools: &Tools, root: &Path, user: &str, password: &Password) -> Result<()> {
    let shadow_file = root.join(paths::SHADOW);
    let content = fs::read_to_string(&shadow_file)?;

    // Check before hashing so a typo in the user name costs nothing
    if find_user_line(&content, user).is_none() {
        return Err(Error::UserNotFound {
            user: user.to_string(),
            shadow: shadow_file,
        });
    }

    let hashed = hash_password(tools, password)?;
    let updated = replace_password_hash(&content, user, &hashed).ok_or_else(|| {
        Error::UserNotFound {
            user: user.to_string(),
            shadow: shadow_file.clone(),
        }
    })?;

    fs::write(&shadow_file, updated)?;
    Ok(())
}

/// SHA-512 crypt hash (`$6$...`) with a random salt, via `openssl passwd -6`.
pub fn hash_password(tools: &Tools, password: &Password) -> Result<String> {
    let input = format!("{}\n", password.expose());
    let hashed = tools.run_with_stdin(Tool::Openssl, ["passwd", "-6", "-stdin"], input.as_bytes())?;

    if hashed.is_empty() || hashed.contains(':') || hashed.contains('\n') {
        return Err(Error::Parse(format!(
            "unexpected output from openssl passwd: '{}'",
            hashed
        )));
    }

    Ok(hashed)
}

fn find_user_line(content: &str, user: &str) -> Option<usize> {
    content
        .split_inclusive('\n')
        .position(|line| matches!(line.split_once(':'), Some((name, _)) if name == user))
}

/// Replace the second field of the first `user:` line. Returns `None` if no
/// line belongs to `user`.
pub fn replace_password_hash(content: &str, user: &str, hash: &str) -> Option<String> {
    let target = find_user_line(content, user)?;
    let mut out = String::with_capacity(content.len() + hash.len());

    for (i, line) in content.split_inclusive('\n').enumerate() {
        if i != target {
            out.push_str(line);
            continue;
        }

        let (body, eol) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        // `find_user_line` guarantees the separator
        let (_, fields) = body.split_once(':')?;

        out.push_str(user);
        out.push(':');
        out.push_str(hash);
        if let Some((_, rest)) = fields.split_once(':') {
            out.push(':');
            out.push_str(rest);
        }
        out.push_str(eol);
    }

    Some(out)
}
