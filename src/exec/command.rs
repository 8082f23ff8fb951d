// src/exec/command.rs

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::ExecResult;

/// Run a recipe command line and collect its output.
///
/// The process runs in `dir`; the engine never changes the working directory
/// of the whole process.
pub async fn run_shell(target: &str, command: &str, dir: &Path) -> Result<ExecResult> {
    info!(goal = %target, cmd = %command, dir = ?dir, "starting recipe process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    cmd.current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .with_context(|| format!("spawning recipe process for '{target}'"))?;

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for recipe process of '{target}'"))?;

    let code = output.status.code().unwrap_or(-1);
    info!(
        goal = %target,
        exit_code = code,
        success = output.status.success(),
        "recipe process exited"
    );

    let result = ExecResult {
        status: code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    for line in result.stderr.lines() {
        debug!(goal = %target, "stderr: {}", line);
    }
    Ok(result)
}

/// Run a command synchronously and return its stdout.
///
/// Used for `execute` definitions, which are evaluated while rule files are
/// loaded. A non-zero exit status is logged, not treated as an error.
pub fn run_capture_sync(command: &str, dir: Option<&Path>) -> crate::errors::Result<String> {
    let mut cmd = if cfg!(windows) {
        let mut c = std::process::Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = std::process::Command::new("sh");
        c.arg("-c").arg(command);
        c
    };
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    let output = cmd.stdin(Stdio::null()).stderr(Stdio::inherit()).output()?;
    if !output.status.success() {
        warn!(cmd = %command, status = ?output.status.code(), "command exited with failure");
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_shell_captures_output_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let ok = run_shell("t", "echo hello && pwd", dir.path()).await.unwrap();
        assert!(ok.success());
        assert!(ok.stdout.starts_with("hello\n"));
        let cwd = ok.stdout.lines().nth(1).unwrap();
        assert_eq!(
            Path::new(cwd).canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );

        let failed = run_shell("t", "echo oops >&2; exit 3", dir.path()).await.unwrap();
        assert_eq!(failed.status, 3);
        assert_eq!(failed.stderr.trim(), "oops");
    }
}
