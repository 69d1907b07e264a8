// forma-core/src/platform.rs
// Host detection and per-release branch selection. The host is detected once
// per process; everything downstream receives the chosen branch as data.

use std::process::{Command, Stdio};

use forma_common::error::{FormaError, Result};
use forma_common::model::platform::{HostPlatform, MacOSVersion, Platform, PlatformBranch};
use forma_common::model::Release;
use tracing::debug;

pub fn detect_host() -> Result<HostPlatform> {
    if cfg!(target_os = "macos") {
        let version = get_macos_version()?;
        debug!("Detected host: macOS {}", version);
        Ok(HostPlatform::MacOS { version })
    } else if cfg!(target_os = "linux") {
        debug!("Detected host: Linux");
        Ok(HostPlatform::Linux)
    } else {
        debug!("Detected unsupported host OS: {}", std::env::consts::OS);
        Ok(HostPlatform::Other(std::env::consts::OS.to_string()))
    }
}

fn get_macos_version() -> Result<MacOSVersion> {
    debug!("Attempting to get macOS version using sw_vers");
    let output = Command::new("sw_vers")
        .arg("-productVersion")
        .stderr(Stdio::piped())
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let version_full = String::from_utf8_lossy(&out.stdout).trim().to_string();
            debug!("Found macOS version: {version_full}");
            version_full.parse()
        }
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            Err(FormaError::BuildEnvError(format!(
                "sw_vers failed to get product version: {}",
                stderr.trim()
            )))
        }
        Err(e) => Err(FormaError::BuildEnvError(format!(
            "Failed to execute 'sw_vers -productVersion': {e}"
        ))),
    }
}

/// Picks the one branch of `release` that applies to `host`.
pub fn select_branch(release: &Release, host: &HostPlatform) -> PlatformBranch {
    let unsupported = |reason: String| PlatformBranch::Unsupported {
        host: host.to_string(),
        reason,
    };
    let declared = || {
        release
            .platforms
            .supported()
            .iter()
            .map(Platform::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    match host {
        HostPlatform::MacOS { version } => match &release.platforms.macos {
            None => unsupported(format!(
                "release {} supports only: {}",
                release.version,
                declared()
            )),
            Some(spec) => match spec.min_version {
                Some(min) if *version < min => unsupported(format!(
                    "release {} requires macOS {} or newer",
                    release.version, min
                )),
                _ => PlatformBranch::MacOS {
                    frameworks: spec.frameworks.clone(),
                    cmake_args: spec.cmake_args.clone(),
                    link_flags: spec.link_flags.clone(),
                    note: spec.note.clone(),
                },
            },
        },
        HostPlatform::Linux => match &release.platforms.linux {
            None => unsupported(format!(
                "release {} supports only: {}",
                release.version,
                declared()
            )),
            Some(spec) => PlatformBranch::Linux {
                cmake_args: spec.cmake_args.clone(),
                link_flags: spec.link_flags.clone(),
                note: spec.note.clone(),
            },
        },
        HostPlatform::Other(name) => unsupported(format!("no formula targets '{name}'")),
    }
}

/// Turns an `Unsupported` branch into the fatal error and passes any other
/// branch through with its platform.
pub fn ensure_supported(formula: &str, release: &Release, branch: &PlatformBranch) -> Result<Platform> {
    match branch {
        PlatformBranch::Unsupported { host, reason } => Err(FormaError::UnsupportedPlatform {
            formula: formula.to_string(),
            version: release.version_str(),
            host: host.clone(),
            reason: reason.clone(),
        }),
        other => other.platform().ok_or_else(|| {
            FormaError::Generic(format!("branch {other:?} carries no platform"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn macos(major: u32, minor: u32) -> HostPlatform {
        HostPlatform::MacOS {
            version: MacOSVersion::new(major, minor),
        }
    }

    #[test]
    fn macos_only_release_rejects_linux() {
        let formula = testutil::formula();
        let release = formula.release(Some("1.0.1")).unwrap();
        let branch = select_branch(release, &HostPlatform::Linux);
        assert!(matches!(branch, PlatformBranch::Unsupported { .. }));
        let err = ensure_supported("ccap", release, &branch).unwrap_err();
        assert!(matches!(err, FormaError::UnsupportedPlatform { .. }));
        assert!(err.to_string().contains("supports only: macOS"));
    }

    #[test]
    fn minimum_macos_version_is_enforced() {
        let formula = testutil::formula();
        let release = formula.release(Some("1.0.0")).unwrap();
        let old = select_branch(release, &macos(10, 12));
        match old {
            PlatformBranch::Unsupported { reason, host } => {
                assert!(reason.contains("requires macOS 10.13"));
                assert_eq!(host, "macOS 10.12");
            }
            other => panic!("expected unsupported, got {other:?}"),
        }
        let current = select_branch(release, &macos(14, 0));
        assert_eq!(current.platform(), Some(Platform::MacOS));
        assert!(current.link_args().contains(&"AVFoundation".to_string()));
    }

    #[test]
    fn later_release_widens_to_linux_with_pthread() {
        let formula = testutil::formula();
        let release = formula.release(Some("1.2.0")).unwrap();
        let branch = select_branch(release, &HostPlatform::Linux);
        assert_eq!(
            ensure_supported("ccap", release, &branch).unwrap(),
            Platform::Linux
        );
        assert_eq!(branch.link_args(), ["-lpthread"]);
        assert!(branch.note().is_some());
    }

    #[test]
    fn unknown_host_is_unsupported() {
        let formula = testutil::formula();
        let release = formula.latest().unwrap();
        let branch = select_branch(release, &HostPlatform::Other("freebsd".into()));
        assert!(ensure_supported("ccap", release, &branch).is_err());
    }

    #[test]
    fn detection_matches_build_target() {
        let host = detect_host().unwrap();
        if cfg!(target_os = "linux") {
            assert_eq!(host, HostPlatform::Linux);
        } else if cfg!(target_os = "macos") {
            assert_eq!(host.platform(), Some(Platform::MacOS));
        }
    }
}
