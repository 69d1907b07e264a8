// forma-core/src/deps.rs
// Dependency declaration for one release on one branch. Declared build tools
// must be locatable before any build step runs; nothing is installed here.

use std::path::PathBuf;

use forma_common::dependency::{Dependency, DependencyExt, DependencyTag};
use forma_common::error::{FormaError, Result};
use forma_common::model::{PlatformBranch, Release};
use tracing::debug;

/// Finds an executable by name.
pub trait ToolLocator {
    fn locate(&self, tool: &str) -> Option<PathBuf>;
}

impl<F> ToolLocator for F
where
    F: Fn(&str) -> Option<PathBuf>,
{
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        self(tool)
    }
}

/// Looks tools up on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathLocator;

impl ToolLocator for PathLocator {
    fn locate(&self, tool: &str) -> Option<PathBuf> {
        which::which(tool).ok()
    }
}

/// The dependencies that apply on the chosen branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredDependencies {
    pub build: Vec<Dependency>,
    pub runtime: Vec<Dependency>,
}

pub fn declare(release: &Release, branch: &PlatformBranch) -> DeclaredDependencies {
    let applicable: Vec<Dependency> = match branch.platform() {
        Some(platform) => release
            .dependencies
            .for_platform(platform)
            .into_iter()
            .cloned()
            .collect(),
        None => release
            .dependencies
            .iter()
            .filter(|d| d.platform.is_none())
            .cloned()
            .collect(),
    };
    let declared = DeclaredDependencies {
        build: applicable
            .filter_by_tags(DependencyTag::BUILD, DependencyTag::empty())
            .into_iter()
            .cloned()
            .collect(),
        runtime: applicable.runtime().into_iter().cloned().collect(),
    };
    debug!(
        "Release {} declares build deps {:?} and runtime deps {:?}",
        release.version,
        declared.build.iter().map(|d| &d.name).collect::<Vec<_>>(),
        declared.runtime.iter().map(|d| &d.name).collect::<Vec<_>>()
    );
    declared
}

/// Locates every build-time dependency. The first one missing is an error.
pub fn ensure_build_tools<L: ToolLocator>(
    declared: &DeclaredDependencies,
    locator: &L,
) -> Result<Vec<(String, PathBuf)>> {
    declared
        .build
        .iter()
        .map(|dep| match locator.locate(&dep.name) {
            Some(path) => {
                debug!("Build dependency '{}' found at {}", dep.name, path.display());
                Ok((dep.name.clone(), path))
            }
            None => Err(FormaError::MissingDependency(
                dep.name.clone(),
                "not found on PATH".to_string(),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use forma_common::model::platform::Platform;

    use super::*;
    use crate::testutil;

    fn linux() -> PlatformBranch {
        PlatformBranch::Linux {
            cmake_args: vec![],
            link_flags: vec![],
            note: None,
        }
    }

    #[test]
    fn platform_conditional_runtime_deps_follow_the_branch() {
        let formula = testutil::formula();
        let mut release = formula.release(Some("1.2.0")).unwrap().clone();
        release
            .dependencies
            .push(Dependency::new_runtime("libv4l").on_platform(Platform::Linux));

        let on_linux = declare(&release, &linux());
        assert_eq!(on_linux.build, [Dependency::new_build("cmake")]);
        assert_eq!(on_linux.runtime.len(), 1);

        let on_macos = declare(
            &release,
            &PlatformBranch::MacOS {
                frameworks: vec![],
                cmake_args: vec![],
                link_flags: vec![],
                note: None,
            },
        );
        assert!(on_macos.runtime.is_empty());
    }

    #[test]
    fn missing_build_tool_is_reported_by_name() {
        let formula = testutil::formula();
        let declared = declare(formula.latest().unwrap(), &linux());
        let nothing = |_: &str| -> Option<PathBuf> { None };
        match ensure_build_tools(&declared, &nothing).unwrap_err() {
            FormaError::MissingDependency(name, _) => assert_eq!(name, "cmake"),
            other => panic!("expected MissingDependency, got {other:?}"),
        }
        let found = ensure_build_tools(&declared, &testutil::locate).unwrap();
        assert_eq!(found, [("cmake".to_string(), PathBuf::from("/usr/bin/cmake"))]);
    }
}
