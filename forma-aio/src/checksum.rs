// forma-aio/src/checksum.rs
use std::path::Path;

use forma_common::error::{FormaError, Result};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Streams a file through SHA256 and returns the lowercase hex digest.
pub async fn file_sha256_async(path: &Path) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    let mut total_bytes_read = 0u64;

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total_bytes_read += n as u64;
    }

    let actual = hex::encode(hasher.finalize());
    debug!(
        "Async Calculated SHA256: {} ({} bytes read) for {}",
        actual,
        total_bytes_read,
        path.display()
    );
    Ok(actual)
}

/// Asynchronously verifies the SHA256 checksum of a file.
pub async fn verify_checksum_async(path: &Path, expected: &str) -> Result<()> {
    let actual = file_sha256_async(path).await?;
    debug!("Expected SHA256:   {}", expected);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(FormaError::Cache(format!(
            "Checksum mismatch for {}: expected {}, got {}",
            path.display(),
            expected,
            actual
        )))
    }
}
