// forma-core/src/audit.rs
// Static checks over a formula. Nothing is fetched or built.

use std::fmt;

use forma_common::dependency::DependencyExt;
use forma_common::model::{Formula, Toggle};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    /// The option is set explicitly by some release but omitted here, so the
    /// build tool's default applies.
    UnsetOption { option: String },
    MissingVerification,
    NoBuildDependencies,
    MissingHead,
    MissingLicense,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// `None` for formula-level findings.
    pub version: Option<String>,
    #[serde(flatten)]
    pub kind: FindingKind,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(version) = &self.version {
            write!(f, "{version}: ")?;
        }
        match &self.kind {
            FindingKind::UnsetOption { option } => write!(
                f,
                "option {option} is not set; the build tool default applies"
            ),
            FindingKind::MissingVerification => f.write_str("no verification program"),
            FindingKind::NoBuildDependencies => f.write_str("declares no build-time dependencies"),
            FindingKind::MissingHead => f.write_str("formula declares no head source"),
            FindingKind::MissingLicense => f.write_str("formula declares no license"),
        }
    }
}

pub fn audit_formula(formula: &Formula) -> Vec<Finding> {
    let mut findings = Vec::new();
    let formula_level = |kind| Finding {
        version: None,
        kind,
    };
    if formula.license.is_none() {
        findings.push(formula_level(FindingKind::MissingLicense));
    }
    if formula.head.is_none() {
        findings.push(formula_level(FindingKind::MissingHead));
    }

    let known = formula.option_names();
    for release in &formula.releases {
        let version = Some(release.version_str());
        for name in &known {
            let value = release
                .build
                .options
                .get(*name)
                .copied()
                .unwrap_or(Toggle::Unset);
            if !value.is_set() {
                findings.push(Finding {
                    version: version.clone(),
                    kind: FindingKind::UnsetOption {
                        option: name.to_string(),
                    },
                });
            }
        }
        if release.test.is_none() {
            findings.push(Finding {
                version: version.clone(),
                kind: FindingKind::MissingVerification,
            });
        }
        if release.dependencies.build_time().is_empty() {
            findings.push(Finding {
                version,
                kind: FindingKind::NoBuildDependencies,
            });
        }
    }
    findings
}
