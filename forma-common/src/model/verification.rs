// forma-common/src/model/verification.rs
//! Per-release smoke test templates. Each release carries the consumer
//! program written against its own public API, so the snippet tracks API
//! changes release by release.

use serde::{Deserialize, Serialize};

fn default_file_name() -> String {
    "test.cpp".to_string()
}

fn default_std() -> String {
    "c++17".to_string()
}

/// `[releases.test]` in a formula file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSpec {
    /// Consumer program source, compiled against the installed prefix.
    pub source: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_std")]
    pub std: String,
    /// Libraries passed as `-l<name>`.
    #[serde(default)]
    pub libraries: Vec<String>,
    #[serde(default)]
    pub cli: Option<CliSpec>,
}

/// The command-line entry point a release installs, and what its output must
/// contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliSpec {
    pub binary: String,
    pub checks: Vec<CliCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliCheck {
    pub args: Vec<String>,
    pub contains: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_file_name_and_standard() {
        let spec: TestSpec =
            toml::from_str("source = \"int main() { return 0; }\"\nlibraries = [\"ccap\"]\n")
                .unwrap();
        assert_eq!(spec.file_name, "test.cpp");
        assert_eq!(spec.std, "c++17");
        assert!(spec.cli.is_none());
    }

    #[test]
    fn cli_checks_parse() {
        let spec: TestSpec = toml::from_str(
            r#"
source = "int main() {}"
[cli]
binary = "ccap"
checks = [
  { args = ["--version"], contains = "ccap version" },
  { args = ["--help"], contains = "Usage" },
]
"#,
        )
        .unwrap();
        let cli = spec.cli.unwrap();
        assert_eq!(cli.binary, "ccap");
        assert_eq!(cli.checks.len(), 2);
        assert_eq!(cli.checks[1].contains, "Usage");
    }
}
