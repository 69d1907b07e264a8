// forma-common/src/model/receipt.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::build_config::Toggle;
use crate::model::platform::Platform;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceiptSource {
    Archive { url: String, sha256: String },
    Head {
        url: String,
        branch: String,
        commit: String,
    },
}

/// Written into the install prefix once the install step succeeded.
/// `certified` only flips to true after verification passed; a prefix whose
/// receipt says `false` exists on disk but is not known to be usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    /// Release whose build and verification data were used. Differs from
    /// `version` for head installs.
    pub release: String,
    pub source: ReceiptSource,
    pub platform: Platform,
    pub options: BTreeMap<String, Toggle>,
    pub installed_at: DateTime<Utc>,
    pub certified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl InstallReceipt {
    pub fn certify(&mut self) {
        self.certified = true;
        self.verification_error = None;
        self.verified_at = Some(Utc::now());
    }

    pub fn decertify(&mut self, reason: impl Into<String>) {
        self.certified = false;
        self.verification_error = Some(reason.into());
        self.verified_at = Some(Utc::now());
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let receipt_json = serde_json::to_string_pretty(self)?;
        fs::write(path, receipt_json)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
