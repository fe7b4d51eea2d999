//! Hash to path resolution for chunk entries.

use camino::Utf8Path;
use ltk_hashtable::{CancellationToken, DictionarySnapshot, HashFamily};
use rayon::prelude::*;
use serde::Serialize;

use crate::chunk::ChunkEntry;
use crate::error::VfsError;

const CLIENT_FAMILIES: &[HashFamily] = &[HashFamily::Game, HashFamily::Lcu];
const LCU_FAMILIES: &[HashFamily] = &[HashFamily::Lcu, HashFamily::Game];

/// Family priority for an archive, from its file name.
///
/// Game client archives (`.wad.client`, `.wad.mobile`) try `game` first,
/// League client archives (`.wad`) try `lcu` first.
pub fn families_for_archive(path: &Utf8Path) -> &'static [HashFamily] {
    let name = path.file_name().unwrap_or_default().to_ascii_lowercase();
    if name.ends_with(".wad") {
        LCU_FAMILIES
    } else {
        CLIENT_FAMILIES
    }
}

/// A chunk entry paired with the path it is shown under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEntry {
    pub entry: ChunkEntry,
    pub path: String,
    /// Whether `path` came from the dictionary rather than the fallback scheme.
    pub resolved: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub entries: Vec<ResolvedEntry>,
    pub unresolved_count: u32,
}

/// Resolves entry hashes against a dictionary snapshot.
///
/// Entries whose hash is unknown get `<unresolved_dir>/<hash:016x>.<ext>`,
/// where `ext` comes from `sniff` (or `bin`). The result keeps entry order.
pub struct PathResolver<'a> {
    snapshot: &'a DictionarySnapshot,
    families: &'a [HashFamily],
    unresolved_dir: &'a str,
}

impl<'a> PathResolver<'a> {
    pub fn new(snapshot: &'a DictionarySnapshot, families: &'a [HashFamily], unresolved_dir: &'a str) -> Self {
        Self {
            snapshot,
            families,
            unresolved_dir,
        }
    }

    /// Name lookup only. `None` means the fallback scheme applies.
    pub fn lookup(&self, hash: u64) -> Option<String> {
        self.snapshot
            .resolve_first(self.families, hash)
            .map(|(_, path)| normalize_path(path))
            .filter(|path| !path.is_empty())
    }

    pub fn fallback_path(&self, hash: u64, extension: Option<&str>) -> String {
        format!("{}/{:016x}.{}", self.unresolved_dir, hash, extension.unwrap_or("bin"))
    }

    /// Resolves every entry. `sniff` is only called for unresolved entries.
    pub fn resolve<F>(&self, entries: &[ChunkEntry], sniff: F, cancel: &CancellationToken) -> Result<Resolution, VfsError>
    where
        F: Fn(&ChunkEntry) -> Option<&'static str> + Sync,
    {
        let resolved = entries
            .par_iter()
            .map(|entry| {
                if cancel.is_cancelled() {
                    return Err(VfsError::Cancelled);
                }
                Ok(match self.lookup(entry.hash) {
                    Some(path) => ResolvedEntry {
                        entry: *entry,
                        path,
                        resolved: true,
                    },
                    None => ResolvedEntry {
                        entry: *entry,
                        path: self.fallback_path(entry.hash, sniff(entry)),
                        resolved: false,
                    },
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let unresolved_count = resolved.iter().filter(|e| !e.resolved).count() as u32;
        tracing::debug!(
            "Resolved {} of {} entries ({} unresolved)",
            resolved.len() as u32 - unresolved_count,
            resolved.len(),
            unresolved_count
        );

        Ok(Resolution {
            entries: resolved,
            unresolved_count,
        })
    }
}

/// Normalises a dictionary path to forward slashes without a leading slash.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}
