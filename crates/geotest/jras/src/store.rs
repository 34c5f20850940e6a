//! Where JRAS documents live: the filesystem, or the in-process memory
//! filesystem for paths under [`MEMORY_PREFIX`].

use crate::document::{RasterDocument, FORMAT_TAG};
use geotest_driver::{DriverError, DriverResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Paths starting with this prefix never touch the disk.
pub const MEMORY_PREFIX: &str = "/vsimem/";

/// Document storage shared by every JRAS handle built from it.
#[derive(Debug, Default)]
pub struct RasterStore {
    memory: Mutex<BTreeMap<PathBuf, RasterDocument>>,
}

impl RasterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_memory_path(path: &Path) -> bool {
        path.to_string_lossy().starts_with(MEMORY_PREFIX)
    }

    pub fn exists(&self, path: &Path) -> bool {
        if Self::is_memory_path(path) {
            self.with_memory(|m| m.contains_key(path))
        } else {
            path.is_file()
        }
    }

    /// Cheap format sniff: the document must start with the format tag.
    pub fn looks_like_jras(&self, path: &Path) -> bool {
        if Self::is_memory_path(path) {
            return self.exists(path);
        }
        let mut head = [0u8; 24];
        let read = fs::File::open(path).and_then(|mut f| f.read(&mut head));
        match read {
            Ok(n) => {
                let text = String::from_utf8_lossy(&head[..n]);
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                compact.starts_with(&format!("{{\"format\":\"{}\"", FORMAT_TAG))
            }
            Err(_) => false,
        }
    }

    pub fn load(&self, path: &Path) -> DriverResult<RasterDocument> {
        let doc = if Self::is_memory_path(path) {
            self.with_memory(|m| m.get(path).cloned())
                .ok_or_else(|| DriverError::NotFound(path.to_path_buf()))?
        } else {
            let file = match fs::File::open(path) {
                Ok(f) => f,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(DriverError::NotFound(path.to_path_buf()))
                }
                Err(e) => return Err(e.into()),
            };
            serde_json::from_reader(BufReader::new(file)).map_err(|e| DriverError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };

        doc.validate().map_err(|reason| DriverError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(doc)
    }

    pub fn save(&self, path: &Path, doc: &RasterDocument) -> DriverResult<()> {
        if Self::is_memory_path(path) {
            self.with_memory(|m| m.insert(path.to_path_buf(), doc.clone()));
            tracing::debug!(path = %path.display(), "stored in memory filesystem");
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer(&mut writer, doc)
            .map_err(|e| DriverError::Other(format!("failed to write {}: {}", path.display(), e)))?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), "wrote dataset");
        Ok(())
    }

    pub fn remove(&self, path: &Path) -> DriverResult<()> {
        if Self::is_memory_path(path) {
            return match self.with_memory(|m| m.remove(path)) {
                Some(_) => Ok(()),
                None => Err(DriverError::NotFound(path.to_path_buf())),
            };
        }
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DriverError::NotFound(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Paths currently held in memory.
    pub fn memory_paths(&self) -> Vec<PathBuf> {
        self.with_memory(|m| m.keys().cloned().collect())
    }

    fn with_memory<T>(&self, f: impl FnOnce(&mut BTreeMap<PathBuf, RasterDocument>) -> T) -> T {
        let mut guard = match self.memory.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}
