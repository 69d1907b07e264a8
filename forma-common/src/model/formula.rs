// forma-common/src/model/formula.rs
// A formula is a named package description with one release per published
// version. Releases are appended, never edited.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::dependency::Dependency;
use crate::error::{FormaError, Result};
use crate::model::build_config::BuildSpec;
use crate::model::platform::PlatformTable;
use crate::model::verification::TestSpec;

/// Release version as authored (`v1.2`) plus its normalized semver form
/// (`1.2.0`). Equality and ordering use the normalized form.
#[derive(Debug, Clone)]
pub struct ReleaseVersion {
    raw: String,
    version: Version,
}

impl ReleaseVersion {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Matches either the authored tag or the normalized version, so both
    /// `v1.0.0` and `1.0.0` select the same release.
    pub fn matches(&self, query: &str) -> bool {
        if self.raw == query {
            return true;
        }
        query
            .parse::<ReleaseVersion>()
            .map(|q| q.version == self.version)
            .unwrap_or(false)
    }
}

impl FromStr for ReleaseVersion {
    type Err = FormaError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        // Pad short versions: "1.2" -> "1.2.0", "2" -> "2.0.0"
        let padded = match bare.split('.').count() {
            1 => format!("{bare}.0.0"),
            2 => format!("{bare}.0"),
            _ => bare.to_string(),
        };
        let version = Version::parse(&padded).map_err(|e| {
            FormaError::ParseError("release version", format!("'{trimmed}': {e}"))
        })?;
        Ok(Self {
            raw: trimmed.to_string(),
            version,
        })
    }
}

impl PartialEq for ReleaseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for ReleaseVersion {}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.version.cmp(&other.version)
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}

impl Serialize for ReleaseVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ReleaseVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A live source-control branch, built without a pinned digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeadSpec {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Release {
    pub version: ReleaseVersion,
    /// Source archive URL
    pub url: String,
    /// SHA256 of the archive, hex encoded
    pub sha256: String,
    #[serde(default)]
    pub mirrors: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub platforms: PlatformTable,
    #[serde(default)]
    pub build: BuildSpec,
    #[serde(default)]
    pub test: Option<TestSpec>,
}

impl Release {
    pub fn version_str(&self) -> String {
        self.version.to_string()
    }

    pub fn installs_cli(&self) -> bool {
        self.test.as_ref().is_some_and(|t| t.cli.is_some())
    }
}

/// Where the source for one evaluation comes from. Exactly one is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Archive {
        url: String,
        sha256: String,
        mirrors: Vec<String>,
    },
    Head {
        url: String,
        branch: String,
    },
}

impl SourceSpec {
    pub fn is_head(&self) -> bool {
        matches!(self, Self::Head { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Archive { url, .. } | Self::Head { url, .. } => url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Formula {
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub head: Option<HeadSpec>,
    pub releases: Vec<Release>,
}

impl Formula {
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let mut formula: Formula = toml::from_str(src)?;
        formula.releases.sort_by(|a, b| a.version.cmp(&b.version));
        formula.validate()?;
        Ok(formula)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The newest release.
    pub fn latest(&self) -> Option<&Release> {
        self.releases.iter().max_by(|a, b| a.version.cmp(&b.version))
    }

    /// Looks a release up by version; `None` selects the latest.
    pub fn release(&self, version: Option<&str>) -> Result<&Release> {
        match version {
            None => self.latest().ok_or_else(|| {
                FormaError::NotFound(format!("formula '{}' has no releases", self.name))
            }),
            Some(query) => self
                .releases
                .iter()
                .find(|r| r.version.matches(query))
                .ok_or_else(|| {
                    FormaError::NotFound(format!(
                        "formula '{}' has no release '{}' (available: {})",
                        self.name,
                        query,
                        self.releases
                            .iter()
                            .map(|r| r.version.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                }),
        }
    }

    /// Picks the source for an evaluation of `release`.
    pub fn source_for(&self, release: &Release, head: bool) -> Result<SourceSpec> {
        if head {
            let spec = self.head.as_ref().ok_or_else(|| {
                FormaError::NotFound(format!("formula '{}' declares no head source", self.name))
            })?;
            return Ok(SourceSpec::Head {
                url: spec.url.clone(),
                branch: spec.branch.clone(),
            });
        }
        Ok(SourceSpec::Archive {
            url: release.url.clone(),
            sha256: release.sha256.clone(),
            mirrors: release.mirrors.clone(),
        })
    }

    /// Every build option any release of this formula declares.
    pub fn option_names(&self) -> BTreeSet<&str> {
        self.releases
            .iter()
            .flat_map(|r| r.build.options.keys().map(String::as_str))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| FormaError::ValidationError(format!("{}: {msg}", self.name));

        if self.name.trim().is_empty() {
            return Err(FormaError::ValidationError(
                "formula name must not be empty".to_string(),
            ));
        }
        if self.releases.is_empty() {
            return Err(invalid("at least one release is required".to_string()));
        }
        let mut seen = HashSet::new();
        for release in &self.releases {
            let version = release.version.to_string();
            if !seen.insert(version.clone()) {
                return Err(invalid(format!("duplicate release {version}")));
            }
            if !is_sha256_hex(&release.sha256) {
                return Err(invalid(format!(
                    "release {version} sha256 must be 64 hex characters, got '{}'",
                    release.sha256
                )));
            }
            for url in std::iter::once(&release.url).chain(release.mirrors.iter()) {
                require_https(url).map_err(|e| invalid(format!("release {version}: {e}")))?;
            }
            if release.platforms.is_empty() {
                return Err(invalid(format!("release {version} declares no platforms")));
            }
        }
        if let Some(head) = &self.head {
            require_https(&head.url).map_err(|e| invalid(format!("head: {e}")))?;
        }
        Ok(())
    }
}

pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn require_https(raw: &str) -> std::result::Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid URL '{raw}': {e}"))?;
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL '{raw}' must use https, got '{}'", url.scheme()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::platform::Platform;

    const DIGEST: &str = "f0c5e3e6144414df531394286ab2e7632f345d97b4cc561eb0ffea6476c5035f";

    fn formula_toml(extra_release: &str) -> String {
        format!(
            r#"
name = "ccap"
desc = "camera capture"
license = "MIT"

[head]
url = "https://github.com/wysaid/CameraCapture.git"

[[releases]]
version = "v1.2.0"
url = "https://example.com/v1.2.0.tar.gz"
sha256 = "{DIGEST}"
[releases.platforms.macos]
[releases.platforms.linux]
link_flags = ["-lpthread"]
[releases.build.options]
CCAP_BUILD_TESTS = false
CCAP_BUILD_CLI = false

[[releases]]
version = "v1.0.0"
url = "https://example.com/v1.0.0.tar.gz"
sha256 = "{DIGEST}"
[releases.platforms.macos]
min_version = "high_sierra"
[releases.build.options]
CCAP_BUILD_TESTS = false
{extra_release}
"#
        )
    }

    #[test]
    fn parses_and_sorts_releases() {
        let formula = Formula::from_toml_str(&formula_toml("")).unwrap();
        let versions: Vec<_> = formula.releases.iter().map(|r| r.version_str()).collect();
        assert_eq!(versions, ["1.0.0", "1.2.0"]);
        assert_eq!(formula.latest().unwrap().version_str(), "1.2.0");
        assert_eq!(formula.head.as_ref().unwrap().branch, "main");
    }

    #[test]
    fn release_lookup_accepts_tag_or_version() {
        let formula = Formula::from_toml_str(&formula_toml("")).unwrap();
        assert_eq!(formula.release(Some("v1.0.0")).unwrap().version_str(), "1.0.0");
        assert_eq!(formula.release(Some("1.0")).unwrap().version_str(), "1.0.0");
        assert!(matches!(
            formula.release(Some("9.9.9")),
            Err(FormaError::NotFound(_))
        ));
    }

    #[test]
    fn platform_support_widens_across_releases() {
        let formula = Formula::from_toml_str(&formula_toml("")).unwrap();
        let old = formula.release(Some("1.0.0")).unwrap();
        let new = formula.release(Some("1.2.0")).unwrap();
        assert_eq!(old.platforms.supported(), vec![Platform::MacOS]);
        assert_eq!(
            new.platforms.supported(),
            vec![Platform::MacOS, Platform::Linux]
        );
    }

    #[test]
    fn option_names_union_every_release() {
        let formula = Formula::from_toml_str(&formula_toml("")).unwrap();
        let names: Vec<_> = formula.option_names().into_iter().collect();
        assert_eq!(names, ["CCAP_BUILD_CLI", "CCAP_BUILD_TESTS"]);
    }

    #[test]
    fn source_selection_is_exclusive() {
        let formula = Formula::from_toml_str(&formula_toml("")).unwrap();
        let release = formula.latest().unwrap();
        let archive = formula.source_for(release, false).unwrap();
        assert!(!archive.is_head());
        assert_eq!(archive.url(), "https://example.com/v1.2.0.tar.gz");
        let head = formula.source_for(release, true).unwrap();
        assert!(head.is_head());
    }

    #[test]
    fn duplicate_versions_are_rejected() {
        let dup = format!(
            "[[releases]]\nversion = \"1.0.0\"\nurl = \"https://example.com/x.tar.gz\"\nsha256 = \"{DIGEST}\"\n[releases.platforms.macos]\n"
        );
        let err = Formula::from_toml_str(&formula_toml(&dup)).unwrap_err();
        assert!(err.to_string().contains("duplicate release 1.0.0"));
    }

    #[test]
    fn malformed_digest_and_plain_http_are_rejected() {
        let src = formula_toml("").replacen(DIGEST, "abc", 1);
        assert!(Formula::from_toml_str(&src).is_err());
        let src = formula_toml("").replacen("https://example.com/v1.2.0", "http://example.com/v1.2.0", 1);
        let err = Formula::from_toml_str(&src).unwrap_err();
        assert!(err.to_string().contains("must use https"));
    }

    #[test]
    fn version_padding() {
        let v: ReleaseVersion = "v2".parse().unwrap();
        assert_eq!(v.to_string(), "2.0.0");
        assert_eq!(v.raw(), "v2");
        assert!("not-a-version".parse::<ReleaseVersion>().is_err());
    }
}
