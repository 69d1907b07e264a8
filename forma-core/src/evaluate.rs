// forma-core/src/evaluate.rs
// One end-to-end evaluation of a release: platform gate, dependencies,
// source, build, receipt, verification. Stages run strictly in that order and
// the first failure ends the evaluation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use forma_common::cache::Cache;
use forma_common::error::{FormaError, Result};
use forma_common::model::{
    BuildConfig, Formula, HostPlatform, InstallReceipt, PlatformBranch, ReceiptSource, Release,
};
use forma_common::Config;
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::build::{self, BuildEnvironment, CommandRunner};
use crate::deps::{self, ToolLocator};
use crate::platform;
use crate::resolve::{ArchiveFetcher, SourceResolver};
use crate::verify::{self, VerificationCase, VerificationOutcome};

/// Version directory used for head installs.
pub const HEAD_VERSION: &str = "HEAD";

/// What the caller asks for.
#[derive(Debug, Clone, Default)]
pub struct EvaluationRequest {
    /// Release to evaluate; `None` selects the latest.
    pub version: Option<String>,
    /// Build from the formula's head branch with the selected release's
    /// build and verification data.
    pub head: bool,
    /// `--with` / `--without` option overrides.
    pub overrides: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub formula: String,
    pub version: String,
    pub host: String,
    pub branch: PlatformBranch,
    pub prefix: PathBuf,
    pub source: ReceiptSource,
    pub from_cache: bool,
    /// Configure, compile and install, as issued.
    pub build_commands: Vec<String>,
    pub verification: VerificationOutcome,
}

/// Holds a previous install aside while its prefix is rebuilt. Dropped while
/// armed, it removes the partial prefix and moves the previous install back.
/// Disarming discards the previous install.
struct PrefixGuard {
    path: PathBuf,
    backup: Option<PathBuf>,
    armed: bool,
}

impl PrefixGuard {
    fn set_aside(path: PathBuf, backup_path: PathBuf) -> Result<Self> {
        if backup_path.exists() {
            if path.exists() {
                std::fs::remove_dir_all(&backup_path)?;
            } else {
                // an interrupted run never put it back
                std::fs::rename(&backup_path, &path)?;
            }
        }
        let backup = if path.exists() {
            info!("Setting existing install at {} aside", path.display());
            std::fs::rename(&path, &backup_path)?;
            Some(backup_path)
        } else {
            None
        };
        Ok(Self {
            path,
            backup,
            armed: true,
        })
    }

    fn disarm(&mut self) {
        self.armed = false;
        if let Some(backup) = self.backup.take() {
            debug!("Discarding previous install at {}", backup.display());
            if let Err(e) = std::fs::remove_dir_all(&backup) {
                warn!("Failed to remove {}: {}", backup.display(), e);
            }
        }
    }
}

impl Drop for PrefixGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.path.exists() {
            warn!("Removing partial install at {}", self.path.display());
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
        if let Some(backup) = self.backup.take() {
            info!("Restoring previous install at {}", self.path.display());
            if let Err(e) = std::fs::rename(&backup, &self.path) {
                warn!(
                    "Failed to restore {} from {}: {}",
                    self.path.display(),
                    backup.display(),
                    e
                );
            }
        }
    }
}

pub struct Evaluator<'a, F, R, L> {
    config: &'a Config,
    cache: &'a Cache,
    host: HostPlatform,
    fetcher: F,
    runner: R,
    locator: L,
}

impl<'a, F, R, L> Evaluator<'a, F, R, L>
where
    F: ArchiveFetcher,
    R: CommandRunner,
    L: ToolLocator,
{
    pub fn new(
        config: &'a Config,
        cache: &'a Cache,
        host: HostPlatform,
        fetcher: F,
        runner: R,
        locator: L,
    ) -> Self {
        Self {
            config,
            cache,
            host,
            fetcher,
            runner,
            locator,
        }
    }

    pub fn host(&self) -> &HostPlatform {
        &self.host
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn select(&self, formula: &Formula, release: &Release) -> Result<PlatformBranch> {
        let branch = platform::select_branch(release, &self.host);
        platform::ensure_supported(formula.name(), release, &branch)?;
        if let Some(note) = branch.note() {
            info!("{}", note);
        }
        Ok(branch)
    }

    fn scratch_dir(&self, name: &str) -> Result<TempDir> {
        let tmp = self.config.tmp_dir();
        std::fs::create_dir_all(&tmp)?;
        Ok(tempfile::Builder::new()
            .prefix(&format!("forma-{name}-"))
            .tempdir_in(&tmp)?)
    }

    pub async fn evaluate(
        &self,
        formula: &Formula,
        request: &EvaluationRequest,
    ) -> Result<EvaluationReport> {
        let name = formula.name();
        let release = formula.release(request.version.as_deref())?;
        let version = release.version_str();
        info!("==> Evaluating {} {} on {}", name, version, self.host);

        let branch = self.select(formula, release)?;
        let platform = branch
            .platform()
            .ok_or_else(|| FormaError::Generic("supported branch without platform".into()))?;

        let declared = deps::declare(release, &branch);
        deps::ensure_build_tools(&declared, &self.locator)?;

        let keg_version = if request.head {
            HEAD_VERSION.to_string()
        } else {
            version.clone()
        };
        let prefix = self.config.formula_keg_path(name, &keg_version);
        let mut build_config =
            BuildConfig::from_spec(&release.build, formula.option_names(), &prefix);
        for (option, value) in &request.overrides {
            build_config.set_option(option, *value)?;
        }
        for unset in build_config.unset_options() {
            warn!(
                "{} {} leaves option {} unset; the build tool default applies",
                name, version, unset
            );
        }

        let scratch = self.scratch_dir(name)?;
        let source = formula.source_for(release, request.head)?;
        let resolver = SourceResolver::new(&self.fetcher, self.cache);
        let tree = resolver
            .resolve(name, &version, &source, scratch.path())
            .await?;

        let env = BuildEnvironment::new(self.config);
        let mut guard = PrefixGuard::set_aside(
            prefix.clone(),
            self.config.formula_keg_backup_path(name, &keg_version),
        )?;
        let plan = build::plan_build(
            &env,
            &tree.root,
            &scratch.path().join("build"),
            &build_config,
            &branch,
        );
        let build_commands = build::run_build(&self.runner, &plan).await?;
        std::fs::create_dir_all(&prefix)?;
        guard.disarm();

        let mut receipt = InstallReceipt {
            name: name.to_string(),
            version: keg_version.clone(),
            release: version.clone(),
            source: tree.origin.clone(),
            platform,
            options: build_config.options.clone(),
            installed_at: Utc::now(),
            certified: false,
            verification_error: None,
            verified_at: None,
        };
        let receipt_path = self.config.receipt_path(name, &keg_version);
        receipt.write_to(&receipt_path)?;
        debug!("Wrote uncertified receipt to {}", receipt_path.display());

        let verification = self
            .verify_release(env.cxx(), release, &prefix, &branch, scratch.path())
            .await;
        let verification = record_verification(&mut receipt, &receipt_path, verification)?;

        info!("==> Installed {} {} at {}", name, keg_version, prefix.display());
        Ok(EvaluationReport {
            formula: name.to_string(),
            version: keg_version,
            host: self.host.to_string(),
            branch,
            prefix,
            source: tree.origin,
            from_cache: tree.from_cache,
            build_commands,
            verification,
        })
    }

    async fn verify_release(
        &self,
        cxx: &Path,
        release: &Release,
        prefix: &Path,
        branch: &PlatformBranch,
        scratch: &Path,
    ) -> Result<VerificationOutcome> {
        let spec = release.test.as_ref().ok_or_else(|| {
            FormaError::VerificationFailed(format!(
                "release {} declares no verification program",
                release.version
            ))
        })?;
        let case = VerificationCase {
            spec,
            prefix,
            branch,
        };
        verify::run_verification(&self.runner, cxx, &case, scratch).await
    }

    /// Warms the archive cache for a release without building anything.
    pub async fn fetch(&self, formula: &Formula, version: Option<&str>) -> Result<PathBuf> {
        let release = formula.release(version)?;
        let resolver = SourceResolver::new(&self.fetcher, self.cache);
        let archive = resolver
            .fetch_archive(
                formula.name(),
                &release.version_str(),
                &release.url,
                &release.sha256,
                &release.mirrors,
            )
            .await?;
        Ok(archive.path)
    }

    /// Re-runs verification against an installed prefix and updates its
    /// receipt. `installed_version` is the keg directory name;
    /// `release_version` overrides the release recorded in the receipt.
    pub async fn reverify(
        &self,
        formula: &Formula,
        installed_version: &str,
        release_version: Option<&str>,
    ) -> Result<VerificationOutcome> {
        let name = formula.name();
        let receipt_path = self.config.receipt_path(name, installed_version);
        let mut receipt = InstallReceipt::read_from(&receipt_path).map_err(|e| {
            FormaError::NotFound(format!(
                "{name} {installed_version} is not installed ({}: {e})",
                receipt_path.display()
            ))
        })?;
        let recorded = receipt.release.clone();
        let release = formula.release(Some(release_version.unwrap_or(&recorded)))?;
        let branch = self.select(formula, release)?;
        let prefix = self.config.formula_keg_path(name, installed_version);
        let scratch = self.scratch_dir(name)?;
        let env = BuildEnvironment::new(self.config);
        let verification = self
            .verify_release(env.cxx(), release, &prefix, &branch, scratch.path())
            .await;
        record_verification(&mut receipt, &receipt_path, verification)
    }
}

fn record_verification(
    receipt: &mut InstallReceipt,
    receipt_path: &Path,
    verification: Result<VerificationOutcome>,
) -> Result<VerificationOutcome> {
    match verification {
        Ok(outcome) => {
            receipt.certify();
            receipt.write_to(receipt_path)?;
            Ok(outcome)
        }
        Err(e) => {
            warn!(
                "{} {} is installed but not certified: {}",
                receipt.name, receipt.version, e
            );
            receipt.decertify(e.to_string());
            receipt.write_to(receipt_path)?;
            Err(e)
        }
    }
}
