//! Selective extraction of tree nodes to disk.
//!
//! # Algorithm
//!
//! 1. Resolve each selected path against the tree; directories expand to all
//!    files below them. Files selected twice are extracted once.
//! 2. Plan every file sequentially: reject unsafe paths, switch overlong or
//!    directory-colliding names to `<hash>.<ext>` at the destination root, and
//!    apply the conflict policy.
//! 3. Write the planned files in parallel. Each file is decompressed (parts
//!    concatenated in order), written to a temporary file next to its target
//!    and renamed into place, so a failed or cancelled write leaves nothing
//!    behind.
//! 4. Record hashed names in `hashed_files.json` at the destination root.
//!
//! Per-file problems never abort the batch; they end up in
//! [`ExtractReport::failures`].

use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Component, Path};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ltk_hashtable::CancellationToken;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{DecompressError, Result, VfsError};
use crate::reader::{ReadOptions, WadArchive};
use crate::resolver::normalize_path;
use crate::tree::{FileNode, TreeNode};

pub const HASHED_FILES_NAME: &str = "hashed_files.json";

/// One selected tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractItem {
    pub path: String,
    #[serde(default)]
    pub is_directory: bool,
}

impl ExtractItem {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractReport {
    pub extracted_count: u32,
    pub skipped_count: u32,
    pub failures: Vec<ExtractFailure>,
    pub cancelled: bool,
    /// Hashed file name to original path, for files written under a hashed name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub hashed_files: BTreeMap<String, String>,
}

/// Progress emitted after each planned file is processed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractProgress {
    pub current_file: String,
    pub current: u32,
    pub total: u32,
}

pub type ExtractProgressCallback = Arc<dyn Fn(ExtractProgress) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Overwrite files that already exist at the destination.
    pub replace_existing: bool,
    /// Longest file name written as-is; longer names are hashed.
    pub max_file_name_len: usize,
    pub read: ReadOptions,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            replace_existing: true,
            max_file_name_len: 255,
            read: ReadOptions::default(),
        }
    }
}

struct Job<'a> {
    file: &'a FileNode,
    target: Utf8PathBuf,
    hashed_name: Option<String>,
}

enum JobOutcome {
    Extracted,
    Failed(String),
    Cancelled,
}

/// Extracts files from one archive using its mounted tree.
pub struct ExtractionEngine<'a> {
    archive: &'a WadArchive,
    tree: &'a TreeNode,
    options: ExtractOptions,
    progress: Option<ExtractProgressCallback>,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(archive: &'a WadArchive, tree: &'a TreeNode) -> Self {
        Self {
            archive,
            tree,
            options: ExtractOptions::default(),
            progress: None,
        }
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, progress: Option<ExtractProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Extracts `selection` below `output_dir`.
    ///
    /// Only failing to create `output_dir` itself is an error; everything
    /// else is reported per file. Cancellation returns the partial report with
    /// `cancelled` set.
    pub fn extract(
        &self,
        selection: &[ExtractItem],
        output_dir: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<ExtractReport> {
        if output_dir.as_str().is_empty() {
            return Err(VfsError::InvalidRequest("output directory is required".to_string()));
        }
        std::fs::create_dir_all(output_dir).map_err(|e| VfsError::io(output_dir, e))?;

        let mut report = ExtractReport::default();
        let files = self.select_files(selection, &mut report);
        let jobs = self.plan(files, output_dir, &mut report);

        tracing::info!(
            "Extracting {} files from {} to {} ({} skipped, {} rejected)",
            jobs.len(),
            self.archive.path(),
            output_dir,
            report.skipped_count,
            report.failures.len()
        );

        let total = jobs.len() as u32;
        let completed = AtomicU32::new(0);
        let outcomes = jobs
            .par_iter()
            .map(|job| {
                if cancel.is_cancelled() {
                    return JobOutcome::Cancelled;
                }
                let outcome = match self.write_file(job, cancel) {
                    Ok(()) => JobOutcome::Extracted,
                    Err(VfsError::Cancelled)
                    | Err(VfsError::Decompress {
                        source: DecompressError::Cancelled,
                        ..
                    }) => JobOutcome::Cancelled,
                    Err(error) => JobOutcome::Failed(error.to_string()),
                };
                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(callback) = &self.progress {
                    callback(ExtractProgress {
                        current_file: job.file.path.clone(),
                        current,
                        total,
                    });
                }
                outcome
            })
            .collect::<Vec<_>>();

        for (job, outcome) in jobs.iter().zip(outcomes) {
            match outcome {
                JobOutcome::Extracted => {
                    report.extracted_count += 1;
                    if let Some(name) = &job.hashed_name {
                        report.hashed_files.insert(name.clone(), job.file.path.clone());
                    }
                }
                JobOutcome::Failed(reason) => {
                    tracing::warn!("Failed to extract {}: {}", job.file.path, reason);
                    report.failures.push(ExtractFailure {
                        path: job.file.path.clone(),
                        reason,
                    });
                }
                JobOutcome::Cancelled => report.cancelled = true,
            }
        }

        if !report.hashed_files.is_empty() {
            if let Err(error) = write_hashed_files(output_dir, &report.hashed_files) {
                report.failures.push(ExtractFailure {
                    path: HASHED_FILES_NAME.to_string(),
                    reason: error.to_string(),
                });
            }
        }

        tracing::info!(
            "Extraction finished: {} extracted, {} skipped, {} failed{}",
            report.extracted_count,
            report.skipped_count,
            report.failures.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    fn select_files(&self, selection: &[ExtractItem], report: &mut ExtractReport) -> Vec<&'a FileNode> {
        let tree: &'a TreeNode = self.tree;
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for item in selection {
            let path = normalize_path(&item.path);
            let Some(node) = tree.find(&path) else {
                report.failures.push(ExtractFailure {
                    path,
                    reason: "not found in archive tree".to_string(),
                });
                continue;
            };
            if node.is_dir() != item.is_directory {
                tracing::debug!("Selection '{}' is_directory={} disagrees with tree", path, item.is_directory);
            }
            for file in node.files() {
                if seen.insert(file.path.as_str()) {
                    files.push(file);
                }
            }
        }
        files
    }

    fn plan(&self, files: Vec<&'a FileNode>, output_dir: &Utf8Path, report: &mut ExtractReport) -> Vec<Job<'a>> {
        let mut jobs = Vec::with_capacity(files.len());

        for file in files {
            if !is_safe_relative_path(&file.path) {
                report.failures.push(ExtractFailure {
                    path: file.path.clone(),
                    reason: "path escapes the output directory".to_string(),
                });
                continue;
            }

            let mut target = output_dir.join(&file.path);
            let mut hashed_name = None;
            if file.name.len() > self.options.max_file_name_len || target.is_dir() {
                let name = hashed_file_name(file);
                tracing::debug!("Writing {} as {}", file.path, name);
                target = output_dir.join(&name);
                hashed_name = Some(name);
            }

            if !self.options.replace_existing && target.exists() {
                report.skipped_count += 1;
                continue;
            }

            jobs.push(Job {
                file,
                target,
                hashed_name,
            });
        }
        jobs
    }

    fn write_file(&self, job: &Job<'_>, cancel: &CancellationToken) -> Result<()> {
        let mut parts = Vec::new();
        for chunk_id in job.file.chunk_ids() {
            if cancel.is_cancelled() {
                return Err(VfsError::Cancelled);
            }
            parts.push(self.archive.load_chunk_by_id(chunk_id, self.options.read, cancel)?);
        }
        let data = if parts.len() == 1 {
            parts.swap_remove(0)
        } else {
            parts.concat()
        };

        let parent = job.target.parent().unwrap_or(Utf8Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| VfsError::io(parent, e))?;
        write_atomic(&job.target, &data)
    }
}

/// `<hash>.<ext>` name used when the real name cannot be written.
pub fn hashed_file_name(file: &FileNode) -> String {
    if file.extension.is_empty() {
        format!("{:016x}", file.hash)
    } else {
        format!("{:016x}.{}", file.hash, file.extension)
    }
}

/// Rejects absolute paths and paths with `..`, root or prefix components.
pub fn is_safe_relative_path(path: &str) -> bool {
    let path = Path::new(path);
    if path.as_os_str().is_empty() || path.is_absolute() {
        return false;
    }
    path.components()
        .all(|component| !matches!(component, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
}

/// Writes `data` to a temporary file beside `target` and renames it over `target`.
pub(crate) fn write_atomic(target: &Utf8Path, data: &[u8]) -> Result<()> {
    let parent = target.parent().unwrap_or(Utf8Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|e| VfsError::io(parent, e))?;
    temp.write_all(data).map_err(|e| VfsError::io(target, e))?;
    temp.persist(target).map_err(|e| VfsError::io(target, e.error))?;
    Ok(())
}

fn write_hashed_files(output_dir: &Utf8Path, hashed: &BTreeMap<String, String>) -> Result<()> {
    let path = output_dir.join(HASHED_FILES_NAME);
    let mut merged = match std::fs::read_to_string(&path) {
        Ok(content) => serde_json::from_str::<BTreeMap<String, String>>(&content).unwrap_or_else(|error| {
            tracing::warn!("Replacing unreadable {}: {}", path, error);
            BTreeMap::new()
        }),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(error) => return Err(VfsError::io(&path, error)),
    };
    merged.extend(hashed.iter().map(|(k, v)| (k.clone(), v.clone())));

    let json = serde_json::to_vec_pretty(&merged)?;
    write_atomic(&path, &json)
}
