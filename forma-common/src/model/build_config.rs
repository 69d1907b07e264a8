// forma-common/src/model/build_config.rs
//! Build option matrix: what a release declares and what an evaluation uses.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::{FormaError, Result};

/// Published formulas always build optimized. The single variant exists so
/// formula files can spell it out; anything else is refused at load time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BuildType {
    #[default]
    Release,
}

impl BuildType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Release => "Release",
        }
    }
}

impl TryFrom<String> for BuildType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("release") {
            Ok(Self::Release)
        } else {
            Err(format!(
                "unsupported build_type '{value}': only optimized 'Release' builds are allowed"
            ))
        }
    }
}

impl From<BuildType> for String {
    fn from(value: BuildType) -> Self {
        value.as_str().to_string()
    }
}

/// A boolean build option. `Unset` keeps "the release never said" apart from
/// an explicit `Off`: no flag is passed and the build tool's default applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    On,
    Off,
    Unset,
}

impl Toggle {
    pub fn from_bool(value: bool) -> Self {
        if value {
            Self::On
        } else {
            Self::Off
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }

    pub fn cmake_value(&self) -> Option<&'static str> {
        match self {
            Self::On => Some("ON"),
            Self::Off => Some("OFF"),
            Self::Unset => None,
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unset => "unset",
        })
    }
}

impl Serialize for Toggle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::On => serializer.serialize_bool(true),
            Self::Off => serializer.serialize_bool(false),
            Self::Unset => serializer.serialize_str("default"),
        }
    }
}

impl<'de> Deserialize<'de> for Toggle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ToggleVisitor;

        impl Visitor<'_> for ToggleVisitor {
            type Value = Toggle;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("true, false, \"on\", \"off\" or \"default\"")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Toggle, E> {
                Ok(Toggle::from_bool(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Toggle, E> {
                match v.to_ascii_lowercase().as_str() {
                    "on" | "true" => Ok(Toggle::On),
                    "off" | "false" => Ok(Toggle::Off),
                    "default" | "unset" => Ok(Toggle::Unset),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(ToggleVisitor)
    }
}

/// `[releases.build]` in a formula file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSpec {
    #[serde(default)]
    pub build_type: BuildType,
    #[serde(default)]
    pub options: BTreeMap<String, Toggle>,
}

/// The resolved matrix handed to the build pipeline for one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
    pub build_type: BuildType,
    pub install_prefix: PathBuf,
    pub options: BTreeMap<String, Toggle>,
}

impl BuildConfig {
    /// Starts from the release's declared values. Every name in `known` that
    /// the release leaves out is recorded as `Unset` rather than dropped.
    pub fn from_spec<'a>(
        spec: &BuildSpec,
        known: impl IntoIterator<Item = &'a str>,
        install_prefix: impl Into<PathBuf>,
    ) -> Self {
        let mut options = spec.options.clone();
        for name in known {
            options.entry(name.to_string()).or_insert(Toggle::Unset);
        }
        Self {
            build_type: spec.build_type,
            install_prefix: install_prefix.into(),
            options,
        }
    }

    pub fn install_prefix(&self) -> &Path {
        &self.install_prefix
    }

    /// Applies a caller override. Only options the formula knows about can be
    /// overridden.
    pub fn set_option(&mut self, name: &str, value: bool) -> Result<()> {
        match self.options.get_mut(name) {
            Some(slot) => {
                *slot = Toggle::from_bool(value);
                Ok(())
            }
            None => Err(FormaError::ValidationError(format!(
                "unknown build option '{name}' (known: {})",
                self.options.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
        }
    }

    pub fn option(&self, name: &str) -> Toggle {
        self.options.get(name).copied().unwrap_or(Toggle::Unset)
    }

    pub fn unset_options(&self) -> Vec<&str> {
        self.options
            .iter()
            .filter(|(_, v)| !v.is_set())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// `-DNAME=ON|OFF` for every explicit option, in name order.
    pub fn cmake_definitions(&self) -> Vec<String> {
        self.options
            .iter()
            .filter_map(|(name, toggle)| match toggle.cmake_value() {
                Some(value) => Some(format!("-D{name}={value}")),
                None => {
                    warn!(
                        "Build option {} is not set by this release; leaving it to the build tool default",
                        name
                    );
                    None
                }
            })
            .collect()
    }
}
