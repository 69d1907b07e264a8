// forma-aio/src/extract.rs
// Handles archive extraction. Decompression is blocking work, so it runs on
// tokio's blocking pool.

use std::io::Read;
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use forma_common::error::{FormaError, Result};
use tracing::debug;
use xz2::read::XzDecoder;
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    TarGz,
    TarBz2,
    TarXz,
    Tar,
    Zip,
}

fn archive_kind(path: &Path) -> Result<ArchiveKind> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let kind = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        ArchiveKind::TarGz
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz") || name.ends_with(".tbz2") {
        ArchiveKind::TarBz2
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        ArchiveKind::TarXz
    } else if name.ends_with(".tar") {
        ArchiveKind::Tar
    } else if name.ends_with(".zip") {
        ArchiveKind::Zip
    } else {
        return Err(FormaError::Generic(format!(
            "Unsupported archive type for extraction: '{}'",
            path.display()
        )));
    };
    Ok(kind)
}

/// Extracts `archive_path` into `target_dir`. The format is inferred from the
/// file name.
pub async fn extract_archive_async(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let kind = archive_kind(archive_path)?;
    debug!(
        "Async Extracting archive '{}' ({:?}) to '{}'",
        archive_path.display(),
        kind,
        target_dir.display()
    );
    tokio::fs::create_dir_all(target_dir).await?;

    let archive_path = archive_path.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(kind, &archive_path, &target_dir))
        .await
        .map_err(|e| FormaError::Generic(format!("JoinError in archive extraction: {e}")))?
}

fn extract_blocking(kind: ArchiveKind, archive_path: &Path, target_dir: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path)?;
    match kind {
        ArchiveKind::TarGz => unpack_tar(GzDecoder::new(file), target_dir, "GZipped TAR"),
        ArchiveKind::TarBz2 => unpack_tar(BzDecoder::new(file), target_dir, "BZipped TAR"),
        ArchiveKind::TarXz => unpack_tar(XzDecoder::new(file), target_dir, "XZipped TAR"),
        ArchiveKind::Tar => unpack_tar(file, target_dir, "TAR"),
        ArchiveKind::Zip => unpack_zip(file, target_dir),
    }
}

// tar::Archive::unpack refuses entries that would escape target_dir.
fn unpack_tar<R: Read>(reader: R, target_dir: &Path, label: &str) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive
        .unpack(target_dir)
        .map_err(|e| FormaError::Generic(format!("Failed to unpack {label}: {e}")))
}

fn unpack_zip(file: std::fs::File, target_dir: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(file)
        .map_err(|e| FormaError::Generic(format!("Failed to open ZIP: {e}")))?;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| FormaError::Generic(format!("Failed to access ZIP entry: {e}")))?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            FormaError::Generic(format!("Unsafe path in ZIP entry '{}'", entry.name()))
        })?;
        let outpath = target_dir.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut outfile = std::fs::File::create(&outpath)?;
        std::io::copy(&mut entry, &mut outfile)?;
        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

/// GitHub-style archives wrap everything in one `<repo>-<tag>/` directory.
/// Returns that directory when it is the only entry, otherwise `dir` itself.
pub fn find_source_root(dir: &Path) -> Result<PathBuf> {
    let mut subdirs = Vec::new();
    let mut has_files = false;
    for entry in std::fs::read_dir(dir)?.flatten() {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else {
            has_files = true;
        }
    }
    if subdirs.len() == 1 && !has_files {
        let root = subdirs.remove(0);
        debug!("Source root is single subdirectory: {}", root.display());
        Ok(root)
    } else {
        debug!("Source root is the extraction directory: {}", dir.display());
        Ok(dir.to_path_buf())
    }
}
