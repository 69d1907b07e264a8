// forma-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use tracing::debug;

use super::error::Result;

// Used when FORMA_ROOT is not set or is empty.
const DEFAULT_FALLBACK_FORMA_ROOT: &str = "/opt/forma";
const RECEIPT_FILENAME: &str = "INSTALL_RECEIPT.json";
/// Appended to a keg directory name while it is set aside for a reinstall.
pub const KEG_BACKUP_SUFFIX: &str = ".forma-backup";

/// Process-wide settings, read from the environment once and then passed by
/// reference into every stage. Nothing below the binary reads `env::var`.
#[derive(Debug, Clone)]
pub struct Config {
    pub forma_root: PathBuf,
    /// Extra directories searched for `<name>.toml` formula files, before the
    /// default `<root>/Formula`.
    pub formula_dirs: Vec<PathBuf>,
    /// Compiler selection handed to the build tool and the verification
    /// compile. `None` lets the tools locate a compiler themselves.
    pub cc: Option<PathBuf>,
    pub cxx: Option<PathBuf>,
    /// Build tool executable, resolved on PATH when not absolute.
    pub cmake: PathBuf,
    pub jobs: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading forma configuration");

        let forma_root_str = env::var("FORMA_ROOT")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                debug!(
                    "FORMA_ROOT not set or empty, falling back to default: {}",
                    DEFAULT_FALLBACK_FORMA_ROOT
                );
                DEFAULT_FALLBACK_FORMA_ROOT.to_string()
            });
        let forma_root = expand_home(Path::new(&forma_root_str));
        debug!("Effective FORMA_ROOT set to: {}", forma_root.display());

        let formula_dirs = env::var_os("FORMA_FORMULA_DIR")
            .map(|v| env::split_paths(&v).map(|p| expand_home(&p)).collect())
            .unwrap_or_default();

        let cc = non_empty_var(&["FORMA_CC", "CC"]).map(PathBuf::from);
        let cxx = non_empty_var(&["FORMA_CXX", "CXX"]).map(PathBuf::from);
        let cmake = non_empty_var(&["FORMA_CMAKE"])
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cmake"));

        let jobs = match non_empty_var(&["FORMA_JOBS"]) {
            Some(raw) => raw.parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(|| {
                super::error::FormaError::Config(format!(
                    "FORMA_JOBS must be a positive integer, got '{raw}'"
                ))
            })?,
            None => num_cpus::get(),
        };

        debug!(
            "Configuration loaded: cc={:?} cxx={:?} cmake={} jobs={}",
            cc,
            cxx,
            cmake.display(),
            jobs
        );
        Ok(Self {
            forma_root,
            formula_dirs,
            cc,
            cxx,
            cmake,
            jobs,
        })
    }

    /// A configuration rooted at `root` with no environment influence.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            forma_root: root.into(),
            formula_dirs: Vec::new(),
            cc: None,
            cxx: None,
            cmake: PathBuf::from("cmake"),
            jobs: 1,
        }
    }

    pub fn forma_root(&self) -> &Path {
        &self.forma_root
    }

    pub fn cellar_dir(&self) -> PathBuf {
        self.forma_root.join("Cellar")
    }

    pub fn default_formula_dir(&self) -> PathBuf {
        self.forma_root.join("Formula")
    }

    /// Formula search order: configured directories first, then the default.
    pub fn formula_search_path(&self) -> Vec<PathBuf> {
        let mut dirs = self.formula_dirs.clone();
        dirs.push(self.default_formula_dir());
        dirs
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.forma_root.join("forma_cache")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.forma_root.join("forma_logs")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.forma_root.join("tmp")
    }

    pub fn formula_cellar_dir(&self, formula_name: &str) -> PathBuf {
        self.cellar_dir().join(formula_name)
    }

    pub fn formula_keg_path(&self, formula_name: &str, version_str: &str) -> PathBuf {
        self.formula_cellar_dir(formula_name).join(version_str)
    }

    pub fn formula_keg_backup_path(&self, formula_name: &str, version_str: &str) -> PathBuf {
        self.formula_cellar_dir(formula_name)
            .join(format!("{version_str}{KEG_BACKUP_SUFFIX}"))
    }

    pub fn receipt_path(&self, formula_name: &str, version_str: &str) -> PathBuf {
        self.formula_keg_path(formula_name, version_str)
            .join(RECEIPT_FILENAME)
    }

    /// The C++ compiler used for the verification compile.
    pub fn cxx_command(&self) -> PathBuf {
        self.cxx.clone().unwrap_or_else(|| PathBuf::from("c++"))
    }
}

pub fn receipt_filename() -> &'static str {
    RECEIPT_FILENAME
}

/// Replaces a leading `~` with the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match UserDirs::new() {
            Some(dirs) => dirs.home_dir().join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

fn non_empty_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| env::var(name).ok().filter(|v| !v.trim().is_empty()))
}
