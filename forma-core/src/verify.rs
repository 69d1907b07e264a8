// forma-core/src/verify.rs
// Post-install smoke test. Step A compiles and runs the release's consumer
// program against the installed prefix; step B runs the installed CLI when
// the release ships one and matches markers against its standard output.

use std::path::Path;

use forma_aio::CommandOutput;
use forma_common::error::{FormaError, Result};
use forma_common::model::{PlatformBranch, TestSpec};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::build::{CommandRunner, Invocation};

/// Result of one CLI output assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CliCheckResult {
    pub command: String,
    pub contains: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationOutcome {
    /// Command lines of the consumer compile and run.
    pub library_commands: Vec<String>,
    /// Passed CLI checks, in declaration order. Empty when the release
    /// installs no entry point.
    pub cli_checks: Vec<CliCheckResult>,
}

/// The consumer program for one release, bound to one prefix and branch.
pub struct VerificationCase<'a> {
    pub spec: &'a TestSpec,
    pub prefix: &'a Path,
    pub branch: &'a PlatformBranch,
}

impl VerificationCase<'_> {
    /// `<cxx> test.cpp -std=<std> -I<prefix>/include -L<prefix>/lib -l<lib>...
    /// <link flags> -o test`
    pub fn compile_invocation(&self, cxx: &Path, workdir: &Path) -> Invocation {
        Invocation::new(cxx)
            .arg(&self.spec.file_name)
            .arg(format!("-std={}", self.spec.std))
            .arg(format!("-I{}", self.prefix.join("include").display()))
            .arg(format!("-L{}", self.prefix.join("lib").display()))
            .args(self.spec.libraries.iter().map(|lib| format!("-l{lib}")))
            .args(self.branch.link_args())
            .args(["-o", "test"])
            .current_dir(workdir)
    }

    pub fn run_invocation(&self, workdir: &Path) -> Invocation {
        Invocation::new(workdir.join("test")).current_dir(workdir)
    }

    /// Writes the consumer source into `workdir`, compiles it there and runs
    /// the result once.
    pub async fn run_library_check<R: CommandRunner>(
        &self,
        runner: &R,
        cxx: &Path,
        workdir: &Path,
    ) -> Result<Vec<String>> {
        tokio::fs::create_dir_all(workdir).await?;
        let source_path = workdir.join(&self.spec.file_name);
        tokio::fs::write(&source_path, &self.spec.source).await?;
        debug!("Wrote consumer program to {}", source_path.display());

        let compile = self.compile_invocation(cxx, workdir);
        let output = runner.run(&compile).await?;
        if !output.success() {
            return Err(failure("consumer program failed to compile", &compile, &output));
        }

        let run = self.run_invocation(workdir);
        let output = runner.run(&run).await?;
        if !output.success() {
            return Err(failure("consumer program failed", &run, &output));
        }
        if !output.stdout.trim().is_empty() {
            debug!("Consumer program output: {}", output.stdout.trim());
        }
        Ok(vec![compile.to_string(), run.to_string()])
    }

    pub async fn run_cli_checks<R: CommandRunner>(&self, runner: &R) -> Result<Vec<CliCheckResult>> {
        let Some(cli) = &self.spec.cli else {
            debug!("No command-line entry point declared; skipping CLI checks");
            return Ok(Vec::new());
        };
        let binary = self.prefix.join("bin").join(&cli.binary);
        let mut results = Vec::with_capacity(cli.checks.len());
        for check in &cli.checks {
            let invocation = Invocation::new(&binary).args(&check.args);
            let output = runner.run(&invocation).await?;
            if !output.success() {
                return Err(failure("CLI check failed", &invocation, &output));
            }
            if !output.stdout.contains(&check.contains) {
                error!(
                    "Output of `{}` lacks '{}':\n{}",
                    invocation,
                    check.contains,
                    output.stdout.trim()
                );
                return Err(FormaError::VerificationFailed(format!(
                    "output of `{}` does not contain '{}'",
                    invocation, check.contains
                )));
            }
            debug!("`{}` output contains '{}'", invocation, check.contains);
            results.push(CliCheckResult {
                command: invocation.to_string(),
                contains: check.contains.clone(),
            });
        }
        Ok(results)
    }
}

fn failure(what: &str, invocation: &Invocation, output: &CommandOutput) -> FormaError {
    error!("{}: `{}` exited with {}", what, invocation, output.status);
    if !output.stderr.trim().is_empty() {
        error!("stderr:\n{}", output.stderr.trim());
    }
    FormaError::VerificationFailed(format!(
        "{what}: `{invocation}` exited with {}",
        output.status
    ))
}

/// Runs step A and then step B. Any failure ends verification.
pub async fn run_verification<R: CommandRunner>(
    runner: &R,
    cxx: &Path,
    case: &VerificationCase<'_>,
    scratch: &Path,
) -> Result<VerificationOutcome> {
    info!("==> Verifying install at {}", case.prefix.display());
    let workdir = scratch.join("verify");
    let library_commands = case.run_library_check(runner, cxx, &workdir).await?;
    let cli_checks = case.run_cli_checks(runner).await?;
    Ok(VerificationOutcome {
        library_commands,
        cli_checks,
    })
}
