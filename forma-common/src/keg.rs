// forma-common/src/keg.rs
use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::config::{receipt_filename, Config, KEG_BACKUP_SUFFIX};
use super::error::Result;
use super::model::receipt::InstallReceipt;

/// One installed prefix under `<root>/Cellar/<name>/<version>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledKeg {
    pub name: String,
    pub version_str: String,
    pub path: PathBuf,
    /// `None` when the receipt is missing or unreadable.
    pub receipt: Option<InstallReceipt>,
}

impl InstalledKeg {
    pub fn is_certified(&self) -> bool {
        self.receipt.as_ref().is_some_and(|r| r.certified)
    }
}

/// Manages querying installed packages in the Cellar.
#[derive(Debug)]
pub struct KegRegistry {
    config: Config,
}

impl KegRegistry {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn get_installed_keg(&self, name: &str, version_str: &str) -> Result<Option<InstalledKeg>> {
        let path = self.config.formula_keg_path(name, version_str);
        if !path.is_dir() {
            debug!(
                "[KEG_REGISTRY:{}] No keg for version {} at {}",
                name,
                version_str,
                path.display()
            );
            return Ok(None);
        }
        Ok(Some(self.load_keg(name, version_str, path)))
    }

    pub fn list_installed_kegs(&self) -> Result<Vec<InstalledKeg>> {
        let mut installed_kegs = Vec::new();
        let cellar_dir = self.config.cellar_dir();
        debug!(
            "[KEG_REGISTRY] list_installed_kegs: Scanning cellar: {}",
            cellar_dir.display()
        );

        if !cellar_dir.is_dir() {
            debug!("[KEG_REGISTRY] Cellar directory not found. Returning empty list.");
            return Ok(installed_kegs);
        }

        for formula_entry in fs::read_dir(&cellar_dir)?.flatten() {
            let formula_path = formula_entry.path();
            let Some(formula_name) = formula_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !formula_path.is_dir() {
                continue;
            }
            let version_entries = match fs::read_dir(&formula_path) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        "[KEG_REGISTRY:{}] Failed to read versions in '{}': {}.",
                        formula_name,
                        formula_path.display(),
                        e
                    );
                    continue;
                }
            };
            for version_entry in version_entries.flatten() {
                let version_path = version_entry.path();
                if !version_path.is_dir() {
                    continue;
                }
                if let Some(version_str) = version_path.file_name().and_then(|n| n.to_str()) {
                    // set aside while a reinstall is in flight
                    if version_str.ends_with(KEG_BACKUP_SUFFIX) {
                        continue;
                    }
                    let version_str = version_str.to_string();
                    installed_kegs.push(self.load_keg(formula_name, &version_str, version_path));
                }
            }
        }
        installed_kegs.sort_by(|a, b| (&a.name, &a.version_str).cmp(&(&b.name, &b.version_str)));
        debug!(
            "[KEG_REGISTRY] Found {} installed keg version(s).",
            installed_kegs.len()
        );
        Ok(installed_kegs)
    }

    fn load_keg(&self, name: &str, version_str: &str, path: PathBuf) -> InstalledKeg {
        let receipt_path = path.join(receipt_filename());
        let receipt = match InstallReceipt::read_from(&receipt_path) {
            Ok(receipt) => Some(receipt),
            Err(e) => {
                warn!(
                    "[KEG_REGISTRY:{}] Unreadable receipt {}: {}",
                    name,
                    receipt_path.display(),
                    e
                );
                None
            }
        };
        InstalledKeg {
            name: name.to_string(),
            version_str: version_str.to_string(),
            path,
            receipt,
        }
    }
}
