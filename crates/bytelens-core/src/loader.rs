//! File ingestion.
//!
//! The [`Loader`] turns paths into [`LoadedFile`]s held entirely in memory.
//! Batches are checked against a total size limit before anything is read;
//! individual files over the per-file limit are skipped.

use std::fmt;
use std::fs;
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::analysis::AnalysisStatus;
use crate::error::{Error, Result};

/// Default per-file size limit (5 MiB).
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Batch limit as a multiple of the per-file limit.
pub const BATCH_FACTOR: u64 = 10;

const MIB: f64 = 1024.0 * 1024.0;

/// Stable identity of a loaded file, derived from its name and content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(String);

impl FileId {
    /// Hashes `name` and `content` with BLAKE3 and keeps 16 hex digits
    pub fn for_content(name: &str, content: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
        hasher.update(content);
        let hex = hasher.finalize().to_hex();
        Self(hex[..16].to_string())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file read into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedFile {
    /// Identity used to deduplicate and address the file
    pub id: FileId,
    /// File name without directories
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// The content
    pub bytes: Bytes,
    /// Content analysis state; `None` until analysis is first requested
    pub analysis: Option<AnalysisStatus>,
}

impl LoadedFile {
    /// Wraps in-memory content as a loaded file.
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        Self {
            id: FileId::for_content(&name, &bytes),
            size: bytes.len() as u64,
            name,
            bytes,
            analysis: None,
        }
    }
}

/// Size limits applied while loading
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Files larger than this are skipped
    pub max_file_size: u64,
    /// Batches whose combined size exceeds this are rejected outright
    pub max_total_size: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            max_total_size: MAX_FILE_SIZE * BATCH_FACTOR,
        }
    }
}

impl LoaderConfig {
    /// Creates a new loader config with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-file limit; the batch limit follows at ten times that
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self.max_total_size = bytes.saturating_mul(BATCH_FACTOR);
        self
    }

    /// Overrides the batch limit
    pub fn max_total_size(mut self, bytes: u64) -> Self {
        self.max_total_size = bytes;
        self
    }
}

/// Result of loading a batch of paths.
#[derive(Debug, Default)]
pub struct LoadBatch {
    /// Files read successfully, in input order
    pub files: Vec<LoadedFile>,
    /// Batch-level diagnostic, if anything was rejected or skipped
    pub error: Option<String>,
}

/// Reads files into memory subject to [`LoaderConfig`] limits
#[derive(Debug, Default)]
pub struct Loader {
    config: LoaderConfig,
}

impl Loader {
    /// Creates a new loader with the given configuration
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// The active limits.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Loads a single file, failing if it cannot be read or is too large.
    pub fn load_file(&self, path: &Path) -> Result<LoadedFile> {
        let size = fs::metadata(path)
            .map_err(|e| Error::file_read(path, e))?
            .len();
        if size > self.config.max_file_size {
            return Err(Error::file_too_large(path, size, self.config.max_file_size));
        }
        self.read(path)
    }

    /// Loads a batch of files.
    ///
    /// - If the combined size exceeds the batch limit, nothing is loaded.
    /// - Oversized files are skipped and the batch continues.
    /// - The first file that cannot be read stops the batch; files read
    ///   before it are kept.
    pub fn load_paths<P: AsRef<Path>>(&self, paths: &[P]) -> LoadBatch {
        let mut sized = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            match fs::metadata(path) {
                Ok(meta) => sized.push((path.to_path_buf(), meta.len())),
                Err(e) => {
                    warn!("Cannot stat {}: {}", path.display(), e);
                    return LoadBatch {
                        files: Vec::new(),
                        error: Some(read_failure(path)),
                    };
                }
            }
        }

        let total: u64 = sized.iter().map(|(_, size)| size).sum();
        if total > self.config.max_total_size {
            warn!(
                "Rejecting batch of {} files ({} bytes total)",
                sized.len(),
                total
            );
            return LoadBatch {
                files: Vec::new(),
                error: Some(format!(
                    "Total file size is too large. Maximum is {}MB.",
                    megabytes(self.config.max_total_size)
                )),
            };
        }

        let mut batch = LoadBatch::default();
        for (path, size) in sized {
            if size > self.config.max_file_size {
                warn!(
                    "Skipping large file: {} ({:.2}MB)",
                    path.display(),
                    size as f64 / MIB
                );
                batch.error.get_or_insert_with(|| {
                    format!(
                        "Skipped files larger than {}MB.",
                        megabytes(self.config.max_file_size)
                    )
                });
                continue;
            }

            match self.read(&path) {
                Ok(file) => batch.files.push(file),
                Err(e) => {
                    warn!("{}", e);
                    batch.error = Some(read_failure(&path));
                    break;
                }
            }
        }

        debug!("Loaded {} files", batch.files.len());
        batch
    }

    fn read(&self, path: &Path) -> Result<LoadedFile> {
        let content = fs::read(path).map_err(|e| Error::file_read(path, e))?;
        Ok(LoadedFile::new(display_name(path), content))
    }
}

/// Formats a byte limit in MiB, dropping a zero fraction.
fn megabytes(bytes: u64) -> String {
    format!("{}", bytes as f64 / MIB)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_failure(path: &Path) -> String {
    format!("Failed to read the file: {}.", display_name(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, len: usize) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&vec![0x5A; len]).unwrap();
        path
    }

    #[test]
    fn test_file_id_is_stable() {
        let a = FileId::for_content("a.bin", b"hello");
        assert_eq!(a, FileId::for_content("a.bin", b"hello"));
        assert_ne!(a, FileId::for_content("b.bin", b"hello"));
        assert_ne!(a, FileId::for_content("a.bin", b"hellO"));
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn test_load_batch() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.bin", 10);
        let b = write(&dir, "b.bin", 20);

        let batch = Loader::default().load_paths(&[a, b]);
        assert_eq!(batch.error, None);
        assert_eq!(batch.files.len(), 2);
        assert_eq!(batch.files[0].name, "a.bin");
        assert_eq!(batch.files[1].size, 20);
        assert!(batch.files[1].analysis.is_none());
    }

    #[test]
    fn test_oversized_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let small = write(&dir, "small.bin", 100);
        let big = write(&dir, "big.bin", 3 * 1024 * 1024);
        let loader = Loader::new(LoaderConfig::new().max_file_size(1024 * 1024));

        let batch = loader.load_paths(&[big, small]);
        assert_eq!(batch.files.len(), 1);
        assert_eq!(batch.files[0].name, "small.bin");
        assert_eq!(
            batch.error.as_deref(),
            Some("Skipped files larger than 1MB.")
        );
    }

    #[test]
    fn test_total_size_rejected() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.bin", 600);
        let b = write(&dir, "b.bin", 600);
        let config = LoaderConfig::new()
            .max_file_size(1024)
            .max_total_size(1024 * 1024);
        assert_eq!(config.max_total_size, 1024 * 1024);

        let loader = Loader::new(config.max_total_size(1000));
        let batch = loader.load_paths(&[a, b]);
        assert!(batch.files.is_empty());
        assert!(batch
            .error
            .unwrap()
            .starts_with("Total file size is too large. Maximum is "));
    }

    #[test]
    fn test_default_limit_message() {
        assert_eq!(megabytes(MAX_FILE_SIZE * BATCH_FACTOR), "50");
        assert_eq!(megabytes(512 * 1024), "0.5");
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone.bin");

        let batch = Loader::default().load_paths(&[missing.clone()]);
        assert_eq!(
            batch.error.as_deref(),
            Some("Failed to read the file: gone.bin.")
        );

        let err = Loader::default().load_file(&missing).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }

    #[test]
    fn test_load_file_too_large() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "big.bin", 2048);
        let loader = Loader::new(LoaderConfig::new().max_file_size(1024));

        let err = loader.load_file(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::FileTooLarge {
                size: 2048,
                limit: 1024,
                ..
            }
        ));
        assert!(err.is_recoverable());
    }
}
