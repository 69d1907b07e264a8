// forma-common/src/dependency/definition.rs
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::model::platform::Platform;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DependencyTag: u8 {
        const RUNTIME = 0b00000001;
        const BUILD   = 0b00000010;
        const TEST    = 0b00000100;
    }
}

impl Default for DependencyTag {
    fn default() -> Self {
        Self::RUNTIME
    }
}

impl fmt::Display for DependencyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub tags: DependencyTag,
    /// Restricts the dependency to one platform; `None` applies everywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl Dependency {
    pub fn new_runtime(name: impl Into<String>) -> Self {
        Self::new_with_tags(name, DependencyTag::RUNTIME)
    }

    pub fn new_build(name: impl Into<String>) -> Self {
        Self::new_with_tags(name, DependencyTag::BUILD)
    }

    pub fn new_with_tags(name: impl Into<String>, tags: DependencyTag) -> Self {
        Self {
            name: name.into(),
            tags,
            platform: None,
        }
    }

    pub fn on_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn applies_to(&self, platform: Platform) -> bool {
        self.platform.is_none_or(|p| p == platform)
    }
}

pub trait DependencyExt {
    fn filter_by_tags(&self, include: DependencyTag, exclude: DependencyTag) -> Vec<&Dependency>;
    fn runtime(&self) -> Vec<&Dependency>;
    fn build_time(&self) -> Vec<&Dependency>;
    fn for_platform(&self, platform: Platform) -> Vec<&Dependency>;
}

impl DependencyExt for Vec<Dependency> {
    fn filter_by_tags(&self, include: DependencyTag, exclude: DependencyTag) -> Vec<&Dependency> {
        self.iter()
            .filter(|dep| dep.tags.contains(include) && !dep.tags.intersects(exclude))
            .collect()
    }

    fn runtime(&self) -> Vec<&Dependency> {
        self.filter_by_tags(DependencyTag::RUNTIME, DependencyTag::empty())
    }

    fn build_time(&self) -> Vec<&Dependency> {
        self.filter_by_tags(DependencyTag::BUILD, DependencyTag::empty())
    }

    fn for_platform(&self, platform: Platform) -> Vec<&Dependency> {
        self.iter().filter(|dep| dep.applies_to(platform)).collect()
    }
}
