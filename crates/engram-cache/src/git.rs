use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use crate::error::CacheError;

/// Run `git` with `args`, optionally inside `cwd`, and return trimmed stdout.
///
/// Prompts are disabled so that missing credentials fail the command instead
/// of blocking on a terminal that is not there.
pub fn run_git<I, S>(cwd: Option<&Path>, args: I) -> Result<String, CacheError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let command = args
        .iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");

    let mut cmd = Command::new("git");
    cmd.args(&args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    debug!(cwd = ?cwd, "git {command}");
    let output = cmd.output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(CacheError::Git {
            command,
            stderr: if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            },
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    trace!(%stdout, "git {command} ok");
    Ok(stdout)
}

/// Like [`run_git`], in a repository directory (`git -C <dir> ...`).
pub fn run_git_in<I, S>(dir: &Path, args: I) -> Result<String, CacheError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut full: Vec<std::ffi::OsString> = vec!["-C".into(), dir.as_os_str().to_os_string()];
    full.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
    run_git(None, full)
}

/// True if `git` can be executed at all.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}
