use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// The three commands of the build pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStep {
    Configure,
    Compile,
    Install,
}

impl BuildStep {
    pub const ALL: [BuildStep; 3] = [Self::Configure, Self::Compile, Self::Install];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Compile => "compile",
            Self::Install => "install",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exit status of an external command. `None` means the process was
/// terminated by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(pub Option<i32>);

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exit status {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum FormaError {
    #[error("Integrity mismatch for {name} {version}: expected sha256 {expected}, got {actual}")]
    IntegrityMismatch {
        name: String,
        version: String,
        expected: String,
        actual: String,
    },

    #[error("Fetch unavailable: failed to download '{0}' from '{1}': {2}")]
    FetchUnavailable(String, String, String),

    #[error("Unsupported platform: {formula} {version} cannot be built on {host}: {reason}")]
    UnsupportedPlatform {
        formula: String,
        version: String,
        host: String,
        reason: String,
    },

    #[error("Build step '{step}' failed with {status}")]
    BuildStepFailed { step: BuildStep, status: ExitStatus },

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Missing build dependency '{0}': {1}")]
    MissingDependency(String, String),

    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Git Error: {0}")]
    Git(#[from] Arc<git2::Error>),

    #[error("Semantic Versioning Error: {0}")]
    SemVer(#[from] Arc<semver::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Cache Error: {0}")]
    Cache(String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Parsing Error in {0}: {1}")]
    ParseError(&'static str, String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Build environment setup failed: {0}")]
    BuildEnvError(String),

    #[error("Failed to execute command: {0}")]
    CommandExecError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl From<std::io::Error> for FormaError {
    fn from(err: std::io::Error) -> Self {
        FormaError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for FormaError {
    fn from(err: reqwest::Error) -> Self {
        FormaError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for FormaError {
    fn from(err: serde_json::Error) -> Self {
        FormaError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for FormaError {
    fn from(err: toml::de::Error) -> Self {
        FormaError::Toml(Arc::new(err))
    }
}

impl From<git2::Error> for FormaError {
    fn from(err: git2::Error) -> Self {
        FormaError::Git(Arc::new(err))
    }
}

impl From<semver::Error> for FormaError {
    fn from(err: semver::Error) -> Self {
        FormaError::SemVer(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, FormaError>;
