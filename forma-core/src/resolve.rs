// forma-core/src/resolve.rs
// Source resolution: a cached or freshly fetched archive whose digest matches
// the release, extracted into the evaluation's scratch directory, or a head
// checkout with no digest.

use std::path::{Path, PathBuf};

use forma_common::cache::Cache;
use forma_common::error::{FormaError, Result};
use forma_common::model::{ReceiptSource, SourceSpec};
use forma_net::{build_http_client, digest_matches, download_with_mirrors, sha256_hex};
use reqwest::Client;
use tracing::{debug, error, info, warn};

/// Moves source bytes from the outside world.
#[allow(async_fn_in_trait)]
pub trait ArchiveFetcher {
    /// Downloads `url`, falling back to `mirrors` in order.
    async fn fetch(&self, name: &str, url: &str, mirrors: &[String]) -> Result<Vec<u8>>;
    /// Checks `branch` of `url` out into `dest` and returns the commit id.
    async fn checkout(&self, url: &str, branch: &str, dest: &Path) -> Result<String>;
}

/// HTTPS downloads through `forma-net`, git checkouts through `forma-aio`.
#[derive(Debug, Clone)]
pub struct NetFetcher {
    client: Client,
}

impl NetFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }
}

impl ArchiveFetcher for NetFetcher {
    async fn fetch(&self, name: &str, url: &str, mirrors: &[String]) -> Result<Vec<u8>> {
        download_with_mirrors(&self.client, name, url, mirrors).await
    }

    async fn checkout(&self, url: &str, branch: &str, dest: &Path) -> Result<String> {
        forma_aio::clone_branch_async(url, branch, dest).await
    }
}

/// A verified archive in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArchive {
    pub path: PathBuf,
    pub sha256: String,
    pub from_cache: bool,
}

/// A source tree ready for configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    pub root: PathBuf,
    pub origin: ReceiptSource,
    pub from_cache: bool,
}

pub struct SourceResolver<'a, F> {
    fetcher: &'a F,
    cache: &'a Cache,
}

impl<'a, F: ArchiveFetcher> SourceResolver<'a, F> {
    pub fn new(fetcher: &'a F, cache: &'a Cache) -> Self {
        Self { fetcher, cache }
    }

    /// Returns the cached archive for (name, version, digest), fetching it
    /// when absent or stale. Bytes whose digest does not match are neither
    /// cached nor returned.
    pub async fn fetch_archive(
        &self,
        name: &str,
        version: &str,
        url: &str,
        sha256: &str,
        mirrors: &[String],
    ) -> Result<CachedArchive> {
        let path = self.cache.archive_path(name, version, sha256, url);
        if path.is_file() {
            match forma_aio::verify_checksum_async(&path, sha256).await {
                Ok(()) => {
                    debug!("Using cached archive {}", path.display());
                    return Ok(CachedArchive {
                        path,
                        sha256: sha256.to_ascii_lowercase(),
                        from_cache: true,
                    });
                }
                Err(FormaError::Cache(msg)) => {
                    warn!("Discarding stale cache entry: {}", msg);
                    self.cache.clear_file(&path)?;
                }
                Err(e) => return Err(e),
            }
        }

        info!("==> Downloading {} {}", name, version);
        let bytes = self.fetcher.fetch(name, url, mirrors).await?;
        let actual = sha256_hex(&bytes);
        debug!("Fetched {} bytes for {} {}, sha256 {}", bytes.len(), name, version, actual);
        if !digest_matches(&actual, sha256) {
            error!(
                "Integrity mismatch for {} {}: expected {}, got {}",
                name, version, sha256, actual
            );
            return Err(FormaError::IntegrityMismatch {
                name: name.to_string(),
                version: version.to_string(),
                expected: sha256.to_string(),
                actual,
            });
        }
        self.cache.store_archive(&path, &bytes)?;
        Ok(CachedArchive {
            path,
            sha256: actual,
            from_cache: false,
        })
    }

    /// Produces the source tree for `source` under `scratch`.
    pub async fn resolve(
        &self,
        name: &str,
        version: &str,
        source: &SourceSpec,
        scratch: &Path,
    ) -> Result<SourceTree> {
        let src_dir = scratch.join("src");
        match source {
            SourceSpec::Archive {
                url,
                sha256,
                mirrors,
            } => {
                let archive = self
                    .fetch_archive(name, version, url, sha256, mirrors)
                    .await?;
                forma_aio::extract_archive_async(&archive.path, &src_dir).await?;
                let root = forma_aio::find_source_root(&src_dir)?;
                debug!("Source for {} {} at {}", name, version, root.display());
                Ok(SourceTree {
                    root,
                    origin: ReceiptSource::Archive {
                        url: url.clone(),
                        sha256: archive.sha256,
                    },
                    from_cache: archive.from_cache,
                })
            }
            SourceSpec::Head { url, branch } => {
                info!("==> Checking out {} ({})", url, branch);
                warn!("Head build of {}: source is unpinned, no digest check", name);
                let dest = src_dir.join(name);
                let commit = self.fetcher.checkout(url, branch, &dest).await?;
                debug!("Head checkout of {} at commit {}", name, commit);
                Ok(SourceTree {
                    root: dest,
                    origin: ReceiptSource::Head {
                        url: url.clone(),
                        branch: branch.clone(),
                        commit,
                    },
                    from_cache: false,
                })
            }
        }
    }
}
