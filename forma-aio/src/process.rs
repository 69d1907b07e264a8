// forma-aio/src/process.rs
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use forma_common::error::{ExitStatus, FormaError, Result};
use tokio::process::Command;
use tracing::{debug, error};

/// Captured result of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.0 == Some(0)
    }
}

/// Runs an external command to completion and captures its output. A
/// non-zero exit is not an error here; the caller decides what it means.
pub async fn run_command_async(
    program: &Path,
    args: &[OsString],
    cwd: Option<&Path>,
    envs: &BTreeMap<String, OsString>,
) -> Result<CommandOutput> {
    debug!(
        "Async Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        program.display(),
        args,
        cwd,
        envs.keys().collect::<Vec<_>>() // Log only keys for envs
    );

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.kill_on_drop(true);

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.envs(envs);

    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null()); // Prevent hanging on stdin

    match cmd.output().await {
        Ok(output) => {
            let result = CommandOutput {
                status: ExitStatus(output.status.code()),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };
            if !result.success() {
                debug!("Async Command failed with {}", result.status);
                if !result.stdout.trim().is_empty() {
                    debug!("Stdout:\n{}", result.stdout.trim());
                }
                if !result.stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", result.stderr.trim());
                }
            } else {
                debug!("Async Command finished successfully.");
            }
            Ok(result)
        }
        Err(e) => {
            error!("Async Failed to execute {}: {}", program.display(), e);
            Err(FormaError::CommandExecError(format!(
                "{}: {e}",
                program.display()
            )))
        }
    }
}
