// forma-common/src/model/platform.rs
//! Platform identities and the per-release platform table.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{FormaError, Result};

/// The closed set of platforms a release can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(rename = "macos")]
    MacOS,
    Linux,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOS => f.write_str("macOS"),
            Self::Linux => f.write_str("Linux"),
        }
    }
}

/// What the evaluating machine is. Detected once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPlatform {
    MacOS { version: MacOSVersion },
    Linux,
    Other(String),
}

impl HostPlatform {
    pub fn platform(&self) -> Option<Platform> {
        match self {
            Self::MacOS { .. } => Some(Platform::MacOS),
            Self::Linux => Some(Platform::Linux),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOS { version } => write!(f, "macOS {version}"),
            Self::Linux => f.write_str("Linux"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

// Release names accepted in place of numeric versions.
const MACOS_CODENAMES: &[(&str, u32, u32)] = &[
    ("sierra", 10, 12),
    ("high_sierra", 10, 13),
    ("mojave", 10, 14),
    ("catalina", 10, 15),
    ("big_sur", 11, 0),
    ("monterey", 12, 0),
    ("ventura", 13, 0),
    ("sonoma", 14, 0),
    ("sequoia", 15, 0),
];

/// A macOS `major.minor` version, orderable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacOSVersion {
    pub major: u32,
    pub minor: u32,
}

impl MacOSVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl Ord for MacOSVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

impl PartialOrd for MacOSVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MacOSVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for MacOSVersion {
    type Err = FormaError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((_, major, minor)) = MACOS_CODENAMES
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(s))
        {
            return Ok(Self::new(*major, *minor));
        }
        let mut parts = s.split('.');
        let parse = |part: Option<&str>| -> Result<u32> {
            part.unwrap_or("0").parse::<u32>().map_err(|e| {
                FormaError::ParseError("macOS version", format!("'{s}': {e}"))
            })
        };
        let major = parse(parts.next())?;
        let minor = parse(parts.next())?;
        Ok(Self::new(major, minor))
    }
}

impl Serialize for MacOSVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacOSVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// `[releases.platforms.macos]` in a formula file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacOSSpec {
    #[serde(default)]
    pub min_version: Option<MacOSVersion>,
    #[serde(default)]
    pub frameworks: Vec<String>,
    #[serde(default)]
    pub cmake_args: Vec<String>,
    #[serde(default)]
    pub link_flags: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// `[releases.platforms.linux]` in a formula file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinuxSpec {
    #[serde(default)]
    pub cmake_args: Vec<String>,
    #[serde(default)]
    pub link_flags: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// The platforms one release declares. An absent table means the release
/// cannot be built there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformTable {
    #[serde(default)]
    pub macos: Option<MacOSSpec>,
    #[serde(default)]
    pub linux: Option<LinuxSpec>,
}

impl PlatformTable {
    pub fn supported(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        if self.macos.is_some() {
            platforms.push(Platform::MacOS);
        }
        if self.linux.is_some() {
            platforms.push(Platform::Linux);
        }
        platforms
    }

    pub fn is_empty(&self) -> bool {
        self.macos.is_none() && self.linux.is_none()
    }
}

/// The one branch an evaluation runs under, chosen once and carried as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PlatformBranch {
    #[serde(rename = "macos")]
    MacOS {
        frameworks: Vec<String>,
        cmake_args: Vec<String>,
        link_flags: Vec<String>,
        note: Option<String>,
    },
    Linux {
        cmake_args: Vec<String>,
        link_flags: Vec<String>,
        note: Option<String>,
    },
    Unsupported {
        host: String,
        reason: String,
    },
}

impl PlatformBranch {
    pub fn platform(&self) -> Option<Platform> {
        match self {
            Self::MacOS { .. } => Some(Platform::MacOS),
            Self::Linux { .. } => Some(Platform::Linux),
            Self::Unsupported { .. } => None,
        }
    }

    /// Extra arguments appended to the configure command.
    pub fn cmake_args(&self) -> &[String] {
        match self {
            Self::MacOS { cmake_args, .. } | Self::Linux { cmake_args, .. } => cmake_args,
            Self::Unsupported { .. } => &[],
        }
    }

    /// Flags the consumer program needs to link against the library.
    pub fn link_args(&self) -> Vec<String> {
        match self {
            Self::MacOS {
                frameworks,
                link_flags,
                ..
            } => frameworks
                .iter()
                .flat_map(|fw| ["-framework".to_string(), fw.clone()])
                .chain(link_flags.iter().cloned())
                .collect(),
            Self::Linux { link_flags, .. } => link_flags.clone(),
            Self::Unsupported { .. } => Vec::new(),
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            Self::MacOS { note, .. } | Self::Linux { note, .. } => note.as_deref(),
            Self::Unsupported { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codenames_and_numbers_parse_to_the_same_version() {
        let named: MacOSVersion = "high_sierra".parse().unwrap();
        let numeric: MacOSVersion = "10.13".parse().unwrap();
        assert_eq!(named, numeric);
        assert_eq!("14".parse::<MacOSVersion>().unwrap(), MacOSVersion::new(14, 0));
        assert!("ten".parse::<MacOSVersion>().is_err());
    }

    #[test]
    fn versions_order_numerically() {
        assert!(MacOSVersion::new(10, 9) < MacOSVersion::new(10, 13));
        assert!(MacOSVersion::new(11, 0) > MacOSVersion::new(10, 15));
    }

    #[test]
    fn macos_link_args_expand_frameworks() {
        let branch = PlatformBranch::MacOS {
            frameworks: vec!["Foundation".into(), "AVFoundation".into()],
            cmake_args: vec![],
            link_flags: vec![],
            note: None,
        };
        assert_eq!(
            branch.link_args(),
            ["-framework", "Foundation", "-framework", "AVFoundation"]
        );
    }

    #[test]
    fn linux_link_args_are_plain_flags() {
        let branch = PlatformBranch::Linux {
            cmake_args: vec![],
            link_flags: vec!["-lpthread".into()],
            note: Some("pthread ships with glibc".into()),
        };
        assert_eq!(branch.link_args(), ["-lpthread"]);
        assert_eq!(branch.note(), Some("pthread ships with glibc"));
        assert_eq!(branch.platform(), Some(Platform::Linux));
    }

    #[test]
    fn platform_table_reports_declared_platforms() {
        let table: PlatformTable = toml::from_str(
            "[macos]\nmin_version = \"high_sierra\"\nframeworks = [\"Foundation\"]\n",
        )
        .unwrap();
        assert_eq!(table.supported(), vec![Platform::MacOS]);
        assert_eq!(
            table.macos.unwrap().min_version,
            Some(MacOSVersion::new(10, 13))
        );
    }
}
