//! Cache of parsed archives keyed by canonical path.

use std::collections::HashMap;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::RwLock;

use crate::error::{Result, VfsError};
use crate::reader::WadArchive;

/// Parsed archives shared between operations.
///
/// Parsing always happens outside the lock; only the map update is locked.
/// A failed parse never touches the map, so a broken reload keeps serving the
/// previously parsed archive.
#[derive(Default)]
pub struct ArchiveCache {
    archives: RwLock<HashMap<Utf8PathBuf, Arc<WadArchive>>>,
}

impl ArchiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The key an archive is cached under.
    pub fn key(path: &Utf8Path) -> Result<Utf8PathBuf> {
        path.canonicalize_utf8().map_err(|e| VfsError::io(path, e))
    }

    pub fn get(&self, path: &Utf8Path) -> Option<Arc<WadArchive>> {
        let key = Self::key(path).ok()?;
        self.archives.read().get(&key).cloned()
    }

    /// Returns the cached archive or parses and caches it.
    pub fn get_or_open(&self, path: &Utf8Path) -> Result<Arc<WadArchive>> {
        let key = Self::key(path)?;
        if let Some(archive) = self.archives.read().get(&key) {
            return Ok(archive.clone());
        }

        let archive = Arc::new(WadArchive::open(&key).map_err(|e| VfsError::wad(&key, e))?);
        tracing::info!("Mounted {} ({} chunks)", key, archive.chunk_count());

        // A concurrent open of the same file may have won the race; keep the first
        Ok(self.archives.write().entry(key).or_insert(archive).clone())
    }

    /// Parses the archive again and swaps it in.
    ///
    /// Readers holding the previous `Arc` keep using it undisturbed.
    pub fn reload(&self, path: &Utf8Path) -> Result<Arc<WadArchive>> {
        let key = Self::key(path)?;
        let archive = match WadArchive::open(&key) {
            Ok(archive) => Arc::new(archive),
            Err(error) => {
                tracing::warn!("Reload of {} failed, keeping the cached archive: {}", key, error);
                return Err(VfsError::wad(&key, error));
            }
        };
        self.archives.write().insert(key, archive.clone());
        Ok(archive)
    }

    pub fn remove(&self, path: &Utf8Path) -> Option<Arc<WadArchive>> {
        let key = Self::key(path).ok()?;
        self.archives.write().remove(&key)
    }

    pub fn clear(&self) {
        self.archives.write().clear();
    }

    pub fn paths(&self) -> Vec<Utf8PathBuf> {
        let mut paths = self.archives.read().keys().cloned().collect::<Vec<_>>();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.archives.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.read().is_empty()
    }
}
