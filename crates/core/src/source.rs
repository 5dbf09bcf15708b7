//! Raw bundle sources: `.zip` archives and folders on disk.
//! 套件來源：`.zip` 壓縮檔與磁碟資料夾。

use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;
use zip::ZipArchive;

/// 套件中的單一原始項目。 / One raw `(path, bytes)` entry of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl BundleEntry {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

/// 讀取套件來源時的錯誤。 / Errors raised while reading a bundle source as a whole.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("expected a .zip archive, got `{name}`")]
    NotAnArchive { name: String },
    #[error("archive could not be decoded: {0}")]
    ArchiveDecode(#[from] zip::result::ZipError),
    #[error("archive entry {path} could not be read: {source}")]
    ArchiveEntry {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to walk folder {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl SourceError {
    /// Whether the error means the archive itself is malformed.
    pub fn is_archive_decode(&self) -> bool {
        matches!(
            self,
            SourceError::ArchiveDecode(_) | SourceError::ArchiveEntry { .. }
        )
    }
}

/// 檔名是否為 `.zip`（不分大小寫）。 / Whether `name` carries a `.zip` extension.
pub fn is_archive_name(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case("zip"))
}

/// Decodes a zip archive into its file entries, in archive order.
/// Directory entries are skipped; `\` separators are normalised to `/`.
pub fn decode_archive(bytes: &[u8]) -> Result<Vec<BundleEntry>, SourceError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let path = file.name().replace('\\', "/");
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|source| SourceError::ArchiveEntry {
                path: path.clone(),
                source,
            })?;
        entries.push(BundleEntry { path, bytes });
    }
    tracing::debug!(entries = entries.len(), "archive decoded");
    Ok(entries)
}

/// Reads every regular file below `root`.
///
/// Paths are relative to the folder's parent, so they start with the folder's own
/// name (`vault/notes/a.md`), matching what a browser folder picker reports.
/// Entries are returned in file-name order per directory.
pub fn read_folder(root: &Path) -> Result<Vec<BundleEntry>, SourceError> {
    let root = fs::canonicalize(root).map_err(|source| SourceError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    let base = root.parent().unwrap_or(&root);

    let mut entries = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|source| SourceError::Walk {
            path: root.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
        let path = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let bytes = fs::read(entry.path()).map_err(|source| SourceError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        entries.push(BundleEntry { path, bytes });
    }
    tracing::debug!(root = %root.display(), entries = entries.len(), "folder read");
    Ok(entries)
}
