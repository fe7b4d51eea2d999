//! The process-wide hash dictionary and its warm cache.
//!
//! # Publication model
//!
//! Each family table lives behind an [`Arc`]. Loads parse outside of any lock,
//! merge into a private copy of the current table, then swap the new `Arc` in
//! under a short write lock. Readers take a [`DictionarySnapshot`] (a set of
//! `Arc` clones) and therefore see either the table before a load or the table
//! after it, never an intermediate state. Writers are serialised by a separate
//! mutex so two concurrent loads of the same family cannot lose entries.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::error::{HashtableError, Result};
use crate::family::HashFamily;
use crate::table::{FamilyTable, ParseStats};

/// Progress emitted while warming the cache.
///
/// `current` counts hash list files finished so far (1-based), `total` is the
/// number of list files discovered under the hash directory.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmProgress {
    pub family: HashFamily,
    pub current_file: String,
    pub current: u32,
    pub total: u32,
}

pub type WarmProgressCallback = Arc<dyn Fn(WarmProgress) + Send + Sync>;

/// Result of a single [`HashDictionary::load`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The file was parsed and merged into its family.
    Loaded(ParseStats),
    /// The same file, unmodified, is already resident.
    AlreadyResident,
}

/// Summary of a warm/prime pass over a hash directory.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmReport {
    pub files_total: usize,
    pub files_loaded: usize,
    /// Files skipped because they were already resident and unmodified.
    pub files_skipped: usize,
    pub entries_loaded: usize,
    pub malformed_lines: usize,
    pub failures: Vec<(Utf8PathBuf, String)>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyStatus {
    pub family: HashFamily,
    pub entries: usize,
    pub sources: Vec<Utf8PathBuf>,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DictionaryStatus {
    pub keep_alive: bool,
    pub families: Vec<FamilyStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceStamp {
    family: HashFamily,
    len: u64,
    modified: Option<SystemTime>,
}

/// Immutable view over the resident tables at one point in time.
#[derive(Debug, Clone, Default)]
pub struct DictionarySnapshot {
    tables: HashMap<HashFamily, Arc<FamilyTable>>,
}

impl DictionarySnapshot {
    pub fn resolve(&self, family: HashFamily, hash: u64) -> Option<&str> {
        self.tables.get(&family).and_then(|table| table.get(hash))
    }

    /// Looks the hash up in each family in order and returns the first hit.
    pub fn resolve_first(&self, families: &[HashFamily], hash: u64) -> Option<(HashFamily, &str)> {
        families
            .iter()
            .find_map(|&family| self.resolve(family, hash).map(|path| (family, path)))
    }

    pub fn family_len(&self, family: HashFamily) -> usize {
        self.tables.get(&family).map_or(0, |table| table.len())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(|table| table.is_empty())
    }
}

/// Hash to name lookup tables, partitioned by [`HashFamily`].
///
/// One dictionary is meant to be shared (behind an `Arc`) by every operation
/// in a process. All methods take `&self`.
pub struct HashDictionary {
    tables: RwLock<HashMap<HashFamily, Arc<FamilyTable>>>,
    sources: RwLock<HashMap<Utf8PathBuf, SourceStamp>>,
    writer: Mutex<()>,
    keep_alive: AtomicBool,
}

impl Default for HashDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HashDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashDictionary")
            .field("keep_alive", &self.keep_alive())
            .field("sources", &self.sources.read().len())
            .finish()
    }
}

impl HashDictionary {
    /// Creates an empty dictionary with keep-alive enabled.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            sources: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
            keep_alive: AtomicBool::new(true),
        }
    }

    /// Loads one hash list file into `family`, merging with what is resident.
    ///
    /// Loading a file that is already resident and unchanged on disk (same
    /// length and modification time) is a no-op.
    pub fn load(&self, family: HashFamily, path: impl AsRef<Utf8Path>) -> Result<LoadOutcome> {
        let path = canonical(path.as_ref())?;
        let stamp = stamp_of(&path, family)?;
        if self.is_resident(&path, &stamp) {
            tracing::trace!("hash list already resident: {}", path);
            return Ok(LoadOutcome::AlreadyResident);
        }

        let (table, stats) = parse_file(&path, family)?;
        log_parse(&path, family, &stats);

        let _guard = self.writer.lock();
        self.publish(family, table);
        self.sources.write().insert(path, stamp);
        Ok(LoadOutcome::Loaded(stats))
    }

    /// Pure lookup in a single family.
    pub fn resolve(&self, family: HashFamily, hash: u64) -> Option<String> {
        self.tables
            .read()
            .get(&family)
            .and_then(|table| table.get(hash))
            .map(str::to_string)
    }

    /// Captures the current tables for lock-free batch resolution.
    pub fn snapshot(&self) -> DictionarySnapshot {
        DictionarySnapshot {
            tables: self.tables.read().clone(),
        }
    }

    pub fn is_loaded(&self, family: HashFamily) -> bool {
        self.tables
            .read()
            .get(&family)
            .is_some_and(|table| !table.is_empty())
    }

    /// Whether tables stay resident after an operation finishes.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive.load(Ordering::SeqCst)
    }

    /// Toggles keep-alive. Turning it off does not evict anything by itself;
    /// resident tables are dropped at the next [`release_if_idle`](Self::release_if_idle).
    pub fn set_keep_alive(&self, keep_alive: bool) {
        self.keep_alive.store(keep_alive, Ordering::SeqCst);
        tracing::debug!("hash dictionary keep-alive set to {}", keep_alive);
    }

    /// Idle point hook. Drops every table when keep-alive is off.
    ///
    /// Returns `true` if tables were released.
    pub fn release_if_idle(&self) -> bool {
        if self.keep_alive() {
            return false;
        }
        self.clear();
        true
    }

    /// Drops all resident tables immediately.
    pub fn clear(&self) {
        let _guard = self.writer.lock();
        self.tables.write().clear();
        self.sources.write().clear();
        tracing::info!("hash dictionary cleared");
    }

    /// Loads every hash list found under `hash_dir` without progress reporting.
    pub fn prime(&self, hash_dir: impl AsRef<Utf8Path>) -> Result<WarmReport> {
        self.warm_cache(hash_dir, None, &CancellationToken::new())
    }

    /// Loads every hash list found under `hash_dir`.
    ///
    /// Files are parsed in parallel. `progress` fires once per finished file.
    /// A file that fails to load is recorded in the report and does not stop
    /// the others. Cancellation stops parsing further files; files that were
    /// fully parsed before the stop are still published.
    pub fn warm_cache(
        &self,
        hash_dir: impl AsRef<Utf8Path>,
        progress: Option<WarmProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<WarmReport> {
        let hash_dir = hash_dir.as_ref();
        let files = discover_hash_files(hash_dir)?;
        let total = files.len() as u32;
        let completed = AtomicU32::new(0);

        tracing::info!("Warming hash cache from {} ({} list files)", hash_dir, total);

        let mut report = WarmReport {
            files_total: files.len(),
            ..Default::default()
        };

        let parsed = files
            .par_iter()
            .map(|(family, path)| {
                if cancel.is_cancelled() {
                    return ParsedFile::Cancelled;
                }
                let outcome = self.parse_if_stale(*family, path);
                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(callback) = &progress {
                    callback(WarmProgress {
                        family: *family,
                        current_file: path.file_name().unwrap_or(path.as_str()).to_string(),
                        current,
                        total,
                    });
                }
                outcome
            })
            .collect::<Vec<_>>();

        let mut merged: BTreeMap<HashFamily, (FamilyTable, Vec<(Utf8PathBuf, SourceStamp)>)> =
            BTreeMap::new();
        for ((family, path), parsed) in files.into_iter().zip(parsed) {
            match parsed {
                ParsedFile::Parsed {
                    path: canonical,
                    stamp,
                    table,
                    stats,
                } => {
                    log_parse(&canonical, family, &stats);
                    report.files_loaded += 1;
                    report.entries_loaded += stats.loaded;
                    report.malformed_lines += stats.malformed;
                    let slot = merged.entry(family).or_default();
                    slot.0.extend(table);
                    slot.1.push((canonical, stamp));
                }
                ParsedFile::Resident => report.files_skipped += 1,
                ParsedFile::Failed(error) => {
                    tracing::warn!("Failed to load hash list {}: {}", path, error);
                    report.failures.push((path, error.to_string()));
                }
                ParsedFile::Cancelled => report.cancelled = true,
            }
        }

        if !merged.is_empty() {
            let _guard = self.writer.lock();
            for (family, (table, stamps)) in merged {
                self.publish(family, table);
                self.sources.write().extend(stamps);
            }
        }

        tracing::info!(
            "Hash cache warm: {} loaded, {} already resident, {} failed{}",
            report.files_loaded,
            report.files_skipped,
            report.failures.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    /// Adds entries that are not yet known to `family`. Existing names win.
    ///
    /// Returns the number of entries that were new.
    pub fn merge_entries(
        &self,
        family: HashFamily,
        entries: impl IntoIterator<Item = (u64, String)>,
    ) -> usize {
        let _guard = self.writer.lock();
        let current = self.tables.read().get(&family).cloned();
        let mut table = current.as_deref().cloned().unwrap_or_default();

        let mut added = 0;
        for (hash, path) in entries {
            if table.get(hash).is_none() {
                table.insert(hash, path);
                added += 1;
            }
        }
        if added > 0 {
            self.tables.write().insert(family, Arc::new(table));
        }
        added
    }

    pub fn status(&self) -> DictionaryStatus {
        let tables = self.tables.read();
        let sources = self.sources.read();

        let families = HashFamily::ALL
            .into_iter()
            .map(|family| {
                let mut family_sources = sources
                    .iter()
                    .filter(|(_, stamp)| stamp.family == family)
                    .map(|(path, _)| path.clone())
                    .collect::<Vec<_>>();
                family_sources.sort();
                FamilyStatus {
                    family,
                    entries: tables.get(&family).map_or(0, |table| table.len()),
                    sources: family_sources,
                }
            })
            .collect();

        DictionaryStatus {
            keep_alive: self.keep_alive(),
            families,
        }
    }

    fn is_resident(&self, path: &Utf8Path, stamp: &SourceStamp) -> bool {
        self.sources.read().get(path) == Some(stamp)
    }

    fn parse_if_stale(&self, family: HashFamily, path: &Utf8Path) -> ParsedFile {
        let result = canonical(path).and_then(|path| {
            let stamp = stamp_of(&path, family)?;
            if self.is_resident(&path, &stamp) {
                return Ok(None);
            }
            let (table, stats) = parse_file(&path, family)?;
            Ok(Some((path, stamp, table, stats)))
        });

        match result {
            Ok(Some((path, stamp, table, stats))) => ParsedFile::Parsed {
                path,
                stamp,
                table,
                stats,
            },
            Ok(None) => ParsedFile::Resident,
            Err(error) => ParsedFile::Failed(error),
        }
    }

    /// Merges `table` into a copy of the family and swaps it in.
    /// Callers must hold `self.writer`.
    fn publish(&self, family: HashFamily, table: FamilyTable) {
        let current = self.tables.read().get(&family).cloned();
        let next = match current {
            Some(current) if !current.is_empty() => {
                let mut next = (*current).clone();
                next.extend(table);
                next
            }
            _ => table,
        };
        self.tables.write().insert(family, Arc::new(next));
    }
}

enum ParsedFile {
    Parsed {
        path: Utf8PathBuf,
        stamp: SourceStamp,
        table: FamilyTable,
        stats: ParseStats,
    },
    Resident,
    Failed(HashtableError),
    Cancelled,
}

/// Lists the hash list files under `hash_dir`, sorted for a stable load order.
pub fn discover_hash_files(hash_dir: &Utf8Path) -> Result<Vec<(HashFamily, Utf8PathBuf)>> {
    if !hash_dir.is_dir() {
        return Err(HashtableError::NotADirectory(hash_dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(hash_dir.as_std_path())
        .sort_by_file_name()
        .into_iter()
        .filter_map(|x| x.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(family) = entry.file_name().to_str().and_then(HashFamily::from_file_name) else {
            continue;
        };
        let path = Utf8PathBuf::from_path_buf(entry.into_path())
            .map_err(|p| HashtableError::NonUtf8Path(p.display().to_string()))?;
        files.push((family, path));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(files)
}

fn canonical(path: &Utf8Path) -> Result<Utf8PathBuf> {
    path.canonicalize_utf8()
        .map_err(|source| HashtableError::io(path, source))
}

fn stamp_of(path: &Utf8Path, family: HashFamily) -> Result<SourceStamp> {
    let metadata = std::fs::metadata(path).map_err(|source| HashtableError::io(path, source))?;
    Ok(SourceStamp {
        family,
        len: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

fn parse_file(path: &Utf8Path, family: HashFamily) -> Result<(FamilyTable, ParseStats)> {
    let file = File::open(path).map_err(|source| HashtableError::io(path, source))?;
    FamilyTable::parse(BufReader::new(file), family).map_err(|source| HashtableError::io(path, source))
}

fn log_parse(path: &Utf8Path, family: HashFamily, stats: &ParseStats) {
    tracing::debug!(
        "Loaded {} {} hashes from {}",
        stats.loaded,
        family,
        path
    );
    if stats.malformed > 0 {
        tracing::warn!("Skipped {} malformed lines in {}", stats.malformed, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_merges_files_of_one_family() {
        let (_guard, dir) = temp_dir();
        fs::write(dir.join("hashes.game.txt.0"), "000000000000aaaa data/a.txt\n").unwrap();
        fs::write(dir.join("hashes.game.txt.1"), "000000000000bbbb data/b.txt\n").unwrap();

        let dictionary = HashDictionary::new();
        dictionary.load(HashFamily::Game, dir.join("hashes.game.txt.0")).unwrap();
        dictionary.load(HashFamily::Game, dir.join("hashes.game.txt.1")).unwrap();

        assert_eq!(dictionary.resolve(HashFamily::Game, 0xaaaa).as_deref(), Some("data/a.txt"));
        assert_eq!(dictionary.resolve(HashFamily::Game, 0xbbbb).as_deref(), Some("data/b.txt"));
        assert_eq!(dictionary.resolve(HashFamily::Lcu, 0xaaaa), None);
    }

    #[test]
    fn test_reload_of_unmodified_file_is_noop() {
        let (_guard, dir) = temp_dir();
        let list = dir.join("hashes.lcu.txt");
        fs::write(&list, "000000000000aaaa plugins/a.json\n").unwrap();

        let dictionary = HashDictionary::new();
        assert!(matches!(
            dictionary.load(HashFamily::Lcu, &list).unwrap(),
            LoadOutcome::Loaded(ParseStats { loaded: 1, .. })
        ));
        assert_eq!(dictionary.load(HashFamily::Lcu, &list).unwrap(), LoadOutcome::AlreadyResident);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_loads() {
        let (_guard, dir) = temp_dir();
        fs::write(dir.join("hashes.game.txt"), "000000000000aaaa data/a.txt\n").unwrap();
        fs::write(dir.join("hashes.extracted.txt"), "000000000000bbbb data/b.txt\n").unwrap();

        let dictionary = HashDictionary::new();
        dictionary.load(HashFamily::Game, dir.join("hashes.game.txt")).unwrap();
        let before = dictionary.snapshot();

        dictionary.load(HashFamily::Game, dir.join("hashes.extracted.txt")).unwrap();
        let after = dictionary.snapshot();

        assert_eq!(before.resolve(HashFamily::Game, 0xbbbb), None);
        assert_eq!(after.resolve(HashFamily::Game, 0xbbbb), Some("data/b.txt"));
        assert_eq!(after.resolve(HashFamily::Game, 0xaaaa), Some("data/a.txt"));
    }

    #[test]
    fn test_keep_alive_controls_release() {
        let (_guard, dir) = temp_dir();
        fs::write(dir.join("hashes.game.txt"), "000000000000aaaa data/a.txt\n").unwrap();

        let dictionary = HashDictionary::new();
        dictionary.prime(&dir).unwrap();
        assert!(!dictionary.release_if_idle());
        assert!(dictionary.is_loaded(HashFamily::Game));

        dictionary.set_keep_alive(false);
        assert!(dictionary.is_loaded(HashFamily::Game));
        assert!(dictionary.release_if_idle());
        assert!(!dictionary.is_loaded(HashFamily::Game));
    }

    #[test]
    fn test_merge_entries_keeps_existing_names() {
        let dictionary = HashDictionary::new();
        assert_eq!(
            dictionary.merge_entries(HashFamily::Game, [(1, "a".to_string()), (2, "b".to_string())]),
            2
        );
        assert_eq!(
            dictionary.merge_entries(HashFamily::Game, [(1, "other".to_string()), (3, "c".to_string())]),
            1
        );
        assert_eq!(dictionary.resolve(HashFamily::Game, 1).as_deref(), Some("a"));
    }

    #[test]
    fn test_warm_cache_rejects_missing_directory() {
        let (_guard, dir) = temp_dir();
        let result = HashDictionary::new().prime(dir.join("missing"));
        assert!(matches!(result, Err(HashtableError::NotADirectory(_))));
    }
}
