// forma-common/src/cache.rs
// Source archive cache, keyed by (name, version, digest).

use std::fs;
use std::path::{Path, PathBuf};

use super::error::{FormaError, Result};
use crate::Config;

const DOWNLOADS_SUBDIR: &str = "downloads";

/// Cache struct to manage cache operations
#[derive(Debug, Clone)]
pub struct Cache {
    cache_dir: PathBuf,
}

impl Cache {
    /// Create a new Cache using the config's cache_dir
    pub fn new(config: &Config) -> Result<Self> {
        Self::at(config.cache_dir())
    }

    pub fn at(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        let downloads = cache_dir.join(DOWNLOADS_SUBDIR);
        if !downloads.exists() {
            fs::create_dir_all(&downloads).map_err(|e| {
                FormaError::Cache(format!(
                    "Failed to create cache directory {}: {e}",
                    downloads.display()
                ))
            })?;
        }
        Ok(Self { cache_dir })
    }

    /// Location of the archive for one (name, version, digest) triple. The
    /// digest is normalized to lowercase so `ABCD` and `abcd` share an entry.
    pub fn archive_path(&self, name: &str, version: &str, digest: &str, url: &str) -> PathBuf {
        let extension = archive_extension(url);
        let filename = format!(
            "{name}--{version}--{}{extension}",
            digest.to_ascii_lowercase()
        );
        self.cache_dir.join(DOWNLOADS_SUBDIR).join(filename)
    }

    /// Stores archive bytes for the given key, writing to a temporary sibling
    /// first so a partially written file is never visible under the final name.
    pub fn store_archive(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("incomplete");
        tracing::debug!("Saving archive to cache file: {}", path.display());
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Clears a specific cache file
    pub fn clear_file(&self, path: &Path) -> Result<()> {
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Keeps the archive's compound extension (`.tar.gz`) so extraction can infer
/// the format from the cached file name.
fn archive_extension(url: &str) -> String {
    let file_name = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .next()
        .unwrap_or_default();
    const COMPOUND: [&str; 3] = [".tar.gz", ".tar.bz2", ".tar.xz"];
    if let Some(ext) = COMPOUND.iter().find(|ext| file_name.ends_with(*ext)) {
        return (*ext).to_string();
    }
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && !ext.contains('/') => format!(".{ext}"),
        _ => String::new(),
    }
}
