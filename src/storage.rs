//! Storage backends: where encoded bytes live.
//!
//! The store is generic over [`Storage`], so format dispatch is identical for
//! the local filesystem and the object-store variant; only the medium
//! primitives are substituted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// A (directory, name) pair identifying a storage location. For the
/// object-store backend, `dir` is a key prefix rather than a local path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub dir: String,
    pub name: String,
}

impl FileReference {
    pub fn new(dir: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    /// The joined path, with a single `/` between the parts.
    pub fn path(&self) -> String {
        join(&self.dir, &self.name)
    }
}

impl std::fmt::Display for FileReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// Join a directory and a name with exactly one separator.
pub(crate) fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}

/// Medium primitives needed by the store: byte-level read/write plus the
/// existence, listing, and modification-time lookups the helpers use.
pub trait Storage: Send + Sync {
    /// Write `bytes` at `path`, creating intermediate directories as needed.
    ///
    /// # Errors
    /// Returns an error if the path cannot be created or written.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Read the full contents at `path`.
    ///
    /// # Errors
    /// Returns an error if the path does not exist or cannot be read.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Whether anything exists at `path`.
    ///
    /// # Errors
    /// Returns an error only if the backend cannot answer the question.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Names (not full paths) of the entries directly under `dir`.
    ///
    /// # Errors
    /// Returns an error if `dir` cannot be listed.
    fn list(&self, dir: &str) -> Result<Vec<String>>;

    /// Create `dir` and its parents if absent.
    ///
    /// # Errors
    /// Returns an error if creation fails. A no-op for backends without
    /// real directories.
    fn create_dir_all(&self, dir: &str) -> Result<()>;

    /// Last modification time at `path` as a unix timestamp, or `None` if the
    /// path is absent. Absence is not an error.
    ///
    /// # Errors
    /// Returns an error if the backend fails while answering.
    fn modified(&self, path: &str) -> Result<Option<i64>>;

    /// Remove the entry at `path`.
    ///
    /// # Errors
    /// Returns an error if removal fails.
    fn remove(&self, path: &str) -> Result<()>;
}

/// Local filesystem backend over std::fs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let path = Path::new(path);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("read {path}"))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(Path::new(path).exists())
    }

    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("list {dir}"))? {
            let entry = entry.with_context(|| format!("list {dir}"))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn create_dir_all(&self, dir: &str) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("mkdir -p {dir}"))
    }

    fn modified(&self, path: &str) -> Result<Option<i64>> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("stat {path}")),
        };
        let modified = meta
            .modified()
            .with_context(|| format!("modification time of {path}"))?;
        let ts = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Ok(Some(ts))
    }

    fn remove(&self, path: &str) -> Result<()> {
        fs::remove_file(path).with_context(|| format!("remove {path}"))
    }
}
