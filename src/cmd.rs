use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use crate::error::{Error, Result};

const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// External utilities the image pipelines shell out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tool {
    Fdisk,
    Partx,
    Losetup,
    Mount,
    Umount,
    Dd,
    Openssl,
    WpaPassphrase,
    Zip,
}

impl Tool {
    /// Executable name looked up on `PATH`
    pub fn binary(self) -> &'static str {
        match self {
            Tool::Fdisk => "fdisk",
            Tool::Partx => "partx",
            Tool::Losetup => "losetup",
            Tool::Mount => "mount",
            Tool::Umount => "umount",
            Tool::Dd => "dd",
            Tool::Openssl => "openssl",
            Tool::WpaPassphrase => "wpa_passphrase",
            Tool::Zip => "zip",
        }
    }
}

#[derive(Debug, Clone)]
struct Invocation {
    program: PathBuf,
    leading: Vec<OsString>,
}

impl Invocation {
    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(&self.leading).args(args);
        command
    }
}

/// Verified handles to every external tool a run needs.
///
/// Built once at startup so a missing dependency is reported before any
/// image is touched, then passed to each component explicitly.
#[derive(Debug, Clone, Default)]
pub struct Tools {
    located: BTreeMap<Tool, Invocation>,
}

impl Tools {
    /// Resolve every tool in `required` on `PATH`.
    pub fn locate(required: &[Tool]) -> Result<Self> {
        Self::resolve(required, |name| which::which(name).ok())
    }

    /// Resolve every tool in `required` within the given search path.
    pub fn locate_in(required: &[Tool], search_path: &OsStr) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::resolve(required, |name| {
            which::which_in(name, Some(search_path), &cwd).ok()
        })
    }

    fn resolve(required: &[Tool], find: impl Fn(&str) -> Option<PathBuf>) -> Result<Self> {
        let mut located = BTreeMap::new();
        let mut missing = Vec::new();

        for &tool in required {
            match find(tool.binary()) {
                Some(program) => {
                    tracing::debug!("Found {} at {}", tool.binary(), program.display());
                    located.insert(
                        tool,
                        Invocation {
                            program,
                            leading: Vec::new(),
                        },
                    );
                }
                None => missing.push(tool.binary()),
            }
        }

        if !missing.is_empty() {
            missing.dedup();
            return Err(Error::ToolMissing(missing.join(", ")));
        }

        Ok(Self { located })
    }

    pub fn has(&self, tool: Tool) -> bool {
        self.located.contains_key(&tool)
    }

    /// Path of the resolved executable
    pub fn path(&self, tool: Tool) -> Option<&Path> {
        self.located.get(&tool).map(|inv| inv.program.as_path())
    }

    fn invocation(&self, tool: Tool) -> Result<&Invocation> {
        self.located
            .get(&tool)
            .ok_or_else(|| Error::ToolMissing(tool.binary().to_string()))
    }

    /// Run a tool with inherited stdio (progress output goes to the terminal).
    pub fn run<I, S>(&self, tool: Tool, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let invocation = self.invocation(tool)?;
        let args: Vec<_> = args.into_iter().collect();
        echo(tool, &args);

        let status = invocation.command(&args).status()?;
        if !status.success() {
            return Err(Error::Command {
                program: tool.binary().to_string(),
                code: status.code(),
                stderr: String::new(),
            });
        }

        Ok(())
    }

    /// Run a tool and capture its trimmed stdout.
    pub fn run_output<I, S>(&self, tool: Tool, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let invocation = self.invocation(tool)?;
        let args: Vec<_> = args.into_iter().collect();
        echo(tool, &args);

        let output = invocation.command(&args).stdin(Stdio::null()).output()?;
        captured(tool, output)
    }

    /// Run a tool with `input` written to its stdin and capture its trimmed
    /// stdout. Used for secrets so they never show up in the argument list.
    pub fn run_with_stdin<I, S>(&self, tool: Tool, args: I, input: &[u8]) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let invocation = self.invocation(tool)?;
        let args: Vec<_> = args.into_iter().collect();
        echo(tool, &args);

        let mut child = invocation
            .command(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Reap the child even when it closed stdin early; its own failure
        // explains a broken pipe better than the pipe error does.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(input),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;
        let stdout = captured(tool, output)?;
        written?;
        Ok(stdout)
    }

    /// Replace a tool with a `/bin/sh -c` script. The script sees the real
    /// arguments as `$1`, `$2`, ...
    #[cfg(test)]
    pub(crate) fn stub(mut self, tool: Tool, script: &str) -> Self {
        self.located.insert(
            tool,
            Invocation {
                program: PathBuf::from("/bin/sh"),
                leading: vec!["-c".into(), script.into(), tool.binary().into()],
            },
        );
        self
    }
}

fn echo<S: AsRef<OsStr>>(tool: Tool, args: &[S]) {
    let args_str: Vec<_> = args.iter().map(|s| s.as_ref().to_string_lossy()).collect();
    println!("{}> {} {}{}", CYAN, tool.binary(), args_str.join(" "), RESET);
}

fn captured(tool: Tool, output: Output) -> Result<String> {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        return Err(Error::Command {
            program: tool.binary().to_string(),
            code: output.status.code(),
            stderr,
        });
    }

    if !stderr.is_empty() {
        tracing::debug!("{} stderr: {}", tool.binary(), stderr);
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
