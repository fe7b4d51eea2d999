//! The process-scoped entry point tying the pipeline together.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use camino::{Utf8Path, Utf8PathBuf};
use ltk_hashtable::{
    merge_extracted_file, CancellationToken, DictionaryStatus, HashDictionary, HashFamily, WarmProgress,
    WarmProgressCallback, WarmReport,
};
use parking_lot::RwLock;
use serde::Serialize;

use crate::bin_text::chunk_to_text;
use crate::cache::ArchiveCache;
use crate::chunk::{ChunkEntry, CompressionType};
use crate::config::VfsConfig;
use crate::error::{Result, VfsError};
use crate::extract::{ExtractItem, ExtractOptions, ExtractProgress, ExtractProgressCallback, ExtractReport, ExtractionEngine};
use crate::hash_scan::{discover_hashes, ExtractHashesReport};
use crate::jobs::{spawn_job, JobHandle};
use crate::reader::WadArchive;
use crate::resolver::{families_for_archive, PathResolver};
use crate::sniff::guess_extension;
use crate::tree::{build_tree, SkippedEntry, TreeNode};

/// Result of mounting an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountedTree {
    pub wad_path: Utf8PathBuf,
    pub tree: TreeNode,
    pub chunk_count: u32,
    /// Entries named by the fallback scheme.
    pub unresolved_count: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedEntry>,
}

/// Progress emitted while mounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountProgress {
    pub stage: MountStage,
    pub chunk_count: u32,
}

/// Stages of a mount, emitted in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MountStage {
    LoadingHashes,
    Parsing,
    Resolving,
    BuildingTree,
    Complete,
}

pub type MountProgressCallback = Arc<dyn Fn(MountProgress) + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VfsStatus {
    pub mounted: Vec<Utf8PathBuf>,
    pub hashes: DictionaryStatus,
}

/// The WAD virtual filesystem.
///
/// One instance is meant to live for the whole process and be shared by
/// reference (or `Arc` for background jobs). It owns the archive cache, the
/// mounted trees and a handle to the hash dictionary.
pub struct WadVfs {
    config: VfsConfig,
    hashes: Arc<HashDictionary>,
    archives: ArchiveCache,
    trees: RwLock<HashMap<Utf8PathBuf, Arc<MountedTree>>>,
}

impl Default for WadVfs {
    fn default() -> Self {
        Self::new(VfsConfig::default())
    }
}

impl WadVfs {
    pub fn new(config: VfsConfig) -> Self {
        Self::with_dictionary(config, Arc::new(HashDictionary::new()))
    }

    /// Creates a filesystem sharing an existing dictionary.
    pub fn with_dictionary(config: VfsConfig, hashes: Arc<HashDictionary>) -> Self {
        hashes.set_keep_alive(config.keep_alive);
        Self {
            config,
            hashes,
            archives: ArchiveCache::new(),
            trees: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    pub fn hashes(&self) -> &Arc<HashDictionary> {
        &self.hashes
    }

    pub fn archives(&self) -> &ArchiveCache {
        &self.archives
    }

    /// Mounts `wad_path`, first loading the hash lists in `hash_dir` if given.
    ///
    /// Hash lists already resident are not parsed again.
    pub fn mount_tree(
        &self,
        wad_path: &Utf8Path,
        hash_dir: Option<&Utf8Path>,
        progress: Option<MountProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<Arc<MountedTree>> {
        if let Some(hash_dir) = hash_dir {
            emit(&progress, MountStage::LoadingHashes, 0);
            let report = self.hashes.warm_cache(hash_dir, None, cancel)?;
            if report.cancelled {
                return Err(VfsError::Cancelled);
            }
        }
        self.mount_with_resident_hashes(wad_path, progress, cancel)
    }

    /// Mounts `wad_path` with whatever hashes are resident right now.
    ///
    /// Never loads hash lists; entries unknown to the current dictionary get
    /// fallback names.
    pub fn load_single_wad(&self, wad_path: &Utf8Path) -> Result<Arc<MountedTree>> {
        self.mount_with_resident_hashes(wad_path, None, &CancellationToken::new())
    }

    fn mount_with_resident_hashes(
        &self,
        wad_path: &Utf8Path,
        progress: Option<MountProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<Arc<MountedTree>> {
        emit(&progress, MountStage::Parsing, 0);
        let archive = self.archives.get_or_open(wad_path)?;
        let chunk_count = archive.chunk_count();
        if cancel.is_cancelled() {
            return Err(VfsError::Cancelled);
        }

        emit(&progress, MountStage::Resolving, chunk_count);
        let snapshot = self.hashes.snapshot();
        let families = families_for_archive(archive.path());
        let resolver = PathResolver::new(&snapshot, families, &self.config.unresolved_dir);
        let resolution = resolver.resolve(archive.entries(), |entry| self.sniff(&archive, entry, cancel), cancel)?;

        emit(&progress, MountStage::BuildingTree, chunk_count);
        let build = build_tree(&resolution.entries);

        let mounted = Arc::new(MountedTree {
            wad_path: archive.path().to_path_buf(),
            tree: build.root,
            chunk_count,
            unresolved_count: resolution.unresolved_count,
            skipped: build.skipped,
        });
        self.trees
            .write()
            .insert(archive.path().to_path_buf(), mounted.clone());

        emit(&progress, MountStage::Complete, chunk_count);
        tracing::info!(
            "Mounted tree for {}: {} chunks, {} unresolved, {} skipped",
            archive.path(),
            chunk_count,
            mounted.unresolved_count,
            mounted.skipped.len()
        );
        self.hashes.release_if_idle();
        Ok(mounted)
    }

    fn sniff(&self, archive: &WadArchive, entry: &ChunkEntry, cancel: &CancellationToken) -> Option<&'static str> {
        if entry.compressed_size > self.config.sniff_limit || entry.compression == CompressionType::Satellite {
            return None;
        }
        archive
            .load_chunk(entry, self.config.read_options(), cancel)
            .ok()
            .and_then(|data| guess_extension(&data))
    }

    /// The tree of the most recent mount of `wad_path`.
    pub fn mounted_tree(&self, wad_path: &Utf8Path) -> Result<Arc<MountedTree>> {
        let key = ArchiveCache::key(wad_path)?;
        self.trees
            .read()
            .get(&key)
            .cloned()
            .ok_or(VfsError::NotMounted(key))
    }

    /// Decompressed bytes of one chunk.
    ///
    /// Only the cache lookup is locked; reading and decompressing run on the
    /// caller's thread without holding anything shared.
    pub fn read_chunk_data(&self, wad_path: &Utf8Path, chunk_id: u32) -> Result<Vec<u8>> {
        let archive = self.archives.get_or_open(wad_path)?;
        archive.load_chunk_by_id(chunk_id, self.config.read_options(), &CancellationToken::new())
    }

    pub fn read_chunk_base64(&self, wad_path: &Utf8Path, chunk_id: u32) -> Result<String> {
        let data = self.read_chunk_data(wad_path, chunk_id)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(data))
    }

    /// Text rendering of one chunk, see [`chunk_to_text`].
    pub fn read_bin_as_text(&self, wad_path: &Utf8Path, chunk_id: u32) -> Result<String> {
        let data = self.read_chunk_data(wad_path, chunk_id)?;
        Ok(chunk_to_text(&data, &self.hashes.snapshot()))
    }

    /// Scans the archive for new names and merges them into the extracted
    /// lists under `hash_dir` and into the resident dictionary.
    pub fn extract_hashes(&self, wad_path: &Utf8Path, hash_dir: &Utf8Path) -> Result<ExtractHashesReport> {
        let archive = self.archives.get_or_open(wad_path)?;
        let (discovered, mut report) =
            discover_hashes(&archive, self.config.read_options(), &CancellationToken::new())?;

        let (_, new_game) = merge_extracted_file(hash_dir, HashFamily::Game, &discovered.game)?;
        let new_bin = if discovered.bin.is_empty() {
            0
        } else {
            merge_extracted_file(hash_dir, HashFamily::BinHashes, &discovered.bin)?.1
        };
        report.new_hash_count = new_game + new_bin;

        self.hashes.merge_entries(HashFamily::Game, discovered.game);
        self.hashes.merge_entries(HashFamily::BinHashes, discovered.bin);

        tracing::info!(
            "Extracted hashes from {}: {} game, {} bin ({} new)",
            archive.path(),
            report.game_hashes,
            report.bin_hashes,
            report.new_hash_count
        );
        Ok(report)
    }

    /// Extracts tree nodes of `wad_path` to `output_dir`.
    ///
    /// Uses the tree of the last mount; an archive that was never mounted is
    /// mounted with the resident hashes first.
    pub fn extract_selected(
        &self,
        wad_path: &Utf8Path,
        items: &[ExtractItem],
        output_dir: &Utf8Path,
        replace_existing: bool,
        progress: Option<ExtractProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ExtractReport> {
        let mounted = match self.mounted_tree(wad_path) {
            Ok(mounted) => mounted,
            Err(VfsError::NotMounted(_)) => self.load_single_wad(wad_path)?,
            Err(error) => return Err(error),
        };
        let archive = self.archives.get_or_open(wad_path)?;

        let report = ExtractionEngine::new(&archive, &mounted.tree)
            .with_options(ExtractOptions {
                replace_existing,
                max_file_name_len: self.config.max_file_name_len,
                read: self.config.read_options(),
            })
            .with_progress(progress)
            .extract(items, output_dir, cancel)?;

        self.hashes.release_if_idle();
        Ok(report)
    }

    pub fn warm_cache(
        &self,
        hash_dir: &Utf8Path,
        progress: Option<WarmProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<WarmReport> {
        Ok(self.hashes.warm_cache(hash_dir, progress, cancel)?)
    }

    /// Synchronous warm without progress, meant to run right before a mount.
    pub fn prime_wad(&self, hash_dir: &Utf8Path) -> Result<WarmReport> {
        Ok(self.hashes.prime(hash_dir)?)
    }

    pub fn set_keep_alive(&self, keep_alive: bool) {
        self.hashes.set_keep_alive(keep_alive);
    }

    /// Drops every resident hash table.
    pub fn clear_cache(&self) {
        self.hashes.clear();
    }

    /// Parses `wad_path` again and swaps it into the cache.
    ///
    /// The previous tree is dropped since chunk ids may have changed; mount
    /// again to get a fresh one. On failure the cached archive and tree stay.
    pub fn reload_wad(&self, wad_path: &Utf8Path) -> Result<Arc<WadArchive>> {
        let archive = self.archives.reload(wad_path)?;
        self.trees.write().remove(archive.path());
        Ok(archive)
    }

    /// Forgets an archive and its tree. Returns whether it was cached.
    pub fn unmount(&self, wad_path: &Utf8Path) -> bool {
        let removed = self.archives.remove(wad_path);
        if let Ok(key) = ArchiveCache::key(wad_path) {
            self.trees.write().remove(&key);
        }
        removed.is_some()
    }

    /// Drops every cached archive and tree.
    pub fn clear_archives(&self) {
        self.archives.clear();
        self.trees.write().clear();
    }

    pub fn status(&self) -> VfsStatus {
        VfsStatus {
            mounted: self.archives.paths(),
            hashes: self.hashes.status(),
        }
    }

    /// [`mount_tree`](Self::mount_tree) on a background thread.
    pub fn spawn_mount_tree(
        self: &Arc<Self>,
        wad_path: Utf8PathBuf,
        hash_dir: Option<Utf8PathBuf>,
    ) -> JobHandle<Arc<MountedTree>, MountProgress> {
        let vfs = self.clone();
        spawn_job("mount-tree", move |emit, cancel| {
            vfs.mount_tree(&wad_path, hash_dir.as_deref(), Some(emit), &cancel)
        })
    }

    /// [`warm_cache`](Self::warm_cache) on a background thread.
    pub fn spawn_warm_cache(self: &Arc<Self>, hash_dir: Utf8PathBuf) -> JobHandle<WarmReport, WarmProgress> {
        let vfs = self.clone();
        spawn_job("warm-cache", move |emit, cancel| {
            vfs.warm_cache(&hash_dir, Some(emit), &cancel)
        })
    }

    /// [`extract_selected`](Self::extract_selected) on a background thread.
    pub fn spawn_extract_selected(
        self: &Arc<Self>,
        wad_path: Utf8PathBuf,
        items: Vec<ExtractItem>,
        output_dir: Utf8PathBuf,
        replace_existing: bool,
    ) -> JobHandle<ExtractReport, ExtractProgress> {
        let vfs = self.clone();
        spawn_job("extract-selected", move |emit, cancel| {
            vfs.extract_selected(&wad_path, &items, &output_dir, replace_existing, Some(emit), &cancel)
        })
    }
}

fn emit(progress: &Option<MountProgressCallback>, stage: MountStage, chunk_count: u32) {
    if let Some(callback) = progress {
        callback(MountProgress { stage, chunk_count });
    }
}
