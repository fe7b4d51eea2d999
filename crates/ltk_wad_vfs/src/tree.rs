//! Virtual directory tree over resolved chunk entries.
//!
//! The tree is a pure function of the resolved entry list: same entries and
//! names in, same tree (structure and ordering) out.

use std::cmp::Ordering;
use std::collections::HashMap;

use camino::Utf8Path;
use serde::{Serialize, Serializer};

use crate::chunk::{ChunkEntry, CompressionType};
use crate::resolver::ResolvedEntry;

/// A node of the virtual tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TreeNode {
    Dir(DirNode),
    File(FileNode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirNode {
    pub name: String,
    /// Forward slash joined path from the archive root; empty for the root.
    pub path: String,
    /// Directories first, then files, each case-insensitively by name.
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub name: String,
    pub path: String,
    /// Chunk holding the file, or its first part when `parts` is not empty.
    pub chunk_id: u32,
    #[serde(serialize_with = "serialize_hash")]
    pub hash: u64,
    pub compressed_size: u64,
    pub decompressed_size: u64,
    pub compression: CompressionType,
    /// Lowercased extension without the dot, empty when there is none.
    pub extension: String,
    /// Further chunks of a file split across several zstd-chunked entries,
    /// in subchunk order. Their content follows `chunk_id`'s.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<u32>,
}

impl FileNode {
    /// All chunk ids making up the file, in content order.
    pub fn chunk_ids(&self) -> impl Iterator<Item = u32> + '_ {
        std::iter::once(self.chunk_id).chain(self.parts.iter().copied())
    }
}

fn serialize_hash<S: Serializer>(hash: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:016x}", hash))
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Dir(dir) => &dir.name,
            TreeNode::File(file) => &file.name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            TreeNode::Dir(dir) => &dir.path,
            TreeNode::File(file) => &file.path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, TreeNode::Dir(_))
    }

    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::Dir(dir) => &dir.children,
            TreeNode::File(_) => &[],
        }
    }

    /// Finds the node at `path` below this node. An empty path is this node.
    ///
    /// Sibling names are unique, so the match is exact and case-sensitive.
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| {
                node.children().iter().find(|child| child.name() == segment)
            })
    }

    /// Every file at or below this node, in tree order.
    pub fn files(&self) -> Vec<&FileNode> {
        let mut files = Vec::new();
        self.collect_files(&mut files);
        files
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a FileNode>) {
        match self {
            TreeNode::File(file) => out.push(file),
            TreeNode::Dir(dir) => dir.children.iter().for_each(|child| child.collect_files(out)),
        }
    }

    pub fn file_count(&self) -> usize {
        match self {
            TreeNode::File(_) => 1,
            TreeNode::Dir(dir) => dir.children.iter().map(TreeNode::file_count).sum(),
        }
    }
}

/// Why an entry was left out of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// The resolved path has no segments.
    EmptyPath,
    /// The path names an existing directory.
    CollidesWithDirectory,
    /// A parent segment is already a file.
    ParentIsFile,
    /// Another entry already claimed the exact same path.
    DuplicatePath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEntry {
    pub chunk_id: u32,
    pub path: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBuild {
    pub root: TreeNode,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Default)]
struct DirBuilder {
    dirs: HashMap<String, DirBuilder>,
    files: HashMap<String, Vec<ChunkEntry>>,
}

impl DirBuilder {
    fn check(&self, segments: &[&str], entry: &ChunkEntry) -> Result<(), SkipReason> {
        let Some((leaf, parents)) = segments.split_last() else {
            return Err(SkipReason::EmptyPath);
        };

        let mut dir = self;
        for segment in parents {
            if dir.files.contains_key(*segment) {
                return Err(SkipReason::ParentIsFile);
            }
            match dir.dirs.get(*segment) {
                Some(child) => dir = child,
                None => return Ok(()),
            }
        }

        if dir.dirs.contains_key(*leaf) {
            return Err(SkipReason::CollidesWithDirectory);
        }
        match dir.files.get(*leaf) {
            Some(existing) if !is_continuation(existing, entry) => Err(SkipReason::DuplicatePath),
            _ => Ok(()),
        }
    }

    fn insert(&mut self, segments: &[&str], entry: ChunkEntry) {
        let Some((leaf, parents)) = segments.split_last() else {
            return;
        };
        let dir = parents.iter().fold(self, |dir, segment| {
            dir.dirs.entry(segment.to_string()).or_default()
        });
        dir.files.entry(leaf.to_string()).or_default().push(entry);
    }

    fn finish(self, name: String, path: String) -> DirNode {
        let mut dirs = self
            .dirs
            .into_iter()
            .map(|(child, builder)| {
                let child_path = join(&path, &child);
                builder.finish(child, child_path)
            })
            .collect::<Vec<_>>();
        dirs.sort_by(|a, b| compare_names(&a.name, &b.name));

        let mut files = self
            .files
            .into_iter()
            .map(|(child, entries)| {
                let child_path = join(&path, &child);
                file_node(child, child_path, entries)
            })
            .collect::<Vec<_>>();
        files.sort_by(|a, b| compare_names(&a.name, &b.name));

        DirNode {
            name,
            path,
            children: dirs
                .into_iter()
                .map(TreeNode::Dir)
                .chain(files.into_iter().map(TreeNode::File))
                .collect(),
        }
    }
}

/// A zstd-chunked entry continues a file when every part so far is also
/// zstd-chunked and its subchunk id is new.
fn is_continuation(existing: &[ChunkEntry], entry: &ChunkEntry) -> bool {
    let Some(subchunk) = chunked_subchunk(entry) else {
        return false;
    };
    existing
        .iter()
        .all(|part| chunked_subchunk(part).is_some_and(|id| id != subchunk))
}

fn chunked_subchunk(entry: &ChunkEntry) -> Option<u32> {
    match entry.compression {
        CompressionType::ZstdChunked => entry.subchunk_id,
        _ => None,
    }
}

fn file_node(name: String, path: String, mut entries: Vec<ChunkEntry>) -> FileNode {
    entries.sort_by_key(|entry| (entry.subchunk_id, entry.id));
    let first = entries[0];

    let extension = Utf8Path::new(&name)
        .extension()
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    FileNode {
        chunk_id: first.id,
        hash: first.hash,
        compressed_size: entries.iter().map(|e| e.compressed_size as u64).sum(),
        decompressed_size: entries.iter().map(|e| e.decompressed_size as u64).sum(),
        compression: first.compression,
        extension,
        parts: entries[1..].iter().map(|e| e.id).collect(),
        name,
        path,
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Builds the tree for `entries`, processed in order.
///
/// Entries that cannot be placed are reported in [`TreeBuild::skipped`] and
/// logged; they never fail the build.
pub fn build_tree(entries: &[ResolvedEntry]) -> TreeBuild {
    let mut root = DirBuilder::default();
    let mut skipped = Vec::new();

    for resolved in entries {
        let segments = resolved
            .path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();

        match root.check(&segments, &resolved.entry) {
            Ok(()) => root.insert(&segments, resolved.entry),
            Err(reason) => {
                tracing::warn!(
                    "Skipping chunk #{} ({:016x}) at '{}': {:?}",
                    resolved.entry.id,
                    resolved.entry.hash,
                    resolved.path,
                    reason
                );
                skipped.push(SkippedEntry {
                    chunk_id: resolved.entry.id,
                    path: resolved.path.clone(),
                    reason,
                });
            }
        }
    }

    TreeBuild {
        root: TreeNode::Dir(root.finish(String::new(), String::new())),
        skipped,
    }
}
