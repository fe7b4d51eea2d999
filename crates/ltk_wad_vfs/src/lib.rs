//! Virtual filesystem over League of Legends WAD archives.
//!
//! A WAD archive is a flat table of hashed, individually compressed chunks.
//! This crate turns one into a browsable directory tree and back into files:
//!
//! - **Container parsing**: WAD versions 1 to 3, with optional checksum
//!   verification ([`WadArchive`])
//! - **Decompression**: raw, gzip, zstd and multi-frame zstd chunks
//! - **Name resolution**: chunk hashes are looked up in a shared
//!   [`HashDictionary`]; unknown chunks get a stable fallback name with an
//!   extension guessed from their content
//! - **Tree building**: a deterministic, sorted [`TreeNode`] hierarchy
//! - **Extraction**: parallel, cancellable and atomic per file
//!
//! Everything is reachable through [`WadVfs`]; [`ipc`] wraps each operation in
//! serializable request/response shapes for a message-passing front-end.
//!
//! # Example
//!
//! ```no_run
//! use ltk_wad_vfs::{CancellationToken, ExtractItem, VfsConfig, WadVfs};
//! use camino::Utf8Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let vfs = WadVfs::new(VfsConfig::default());
//! let cancel = CancellationToken::new();
//! let wad = Utf8Path::new("C:/Riot Games/League of Legends/Game/DATA/FINAL/Champions/Aatrox.wad.client");
//!
//! let mounted = vfs.mount_tree(wad, Some(Utf8Path::new("hashes")), None, &cancel)?;
//! println!("{} chunks, {} unresolved", mounted.chunk_count, mounted.unresolved_count);
//!
//! let report = vfs.extract_selected(
//!     wad,
//!     &[ExtractItem::directory("data")],
//!     Utf8Path::new("out"),
//!     true,
//!     None,
//!     &cancel,
//! )?;
//! println!("extracted {} files", report.extracted_count);
//! # Ok(())
//! # }
//! ```

pub mod bin_text;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod decompress;
pub mod error;
pub mod extract;
pub mod hash_scan;
pub mod ipc;
pub mod jobs;
pub mod reader;
pub mod resolver;
pub mod service;
pub mod sniff;
pub mod tree;

// Re-export main types
pub use cache::ArchiveCache;
pub use chunk::{ChunkEntry, CompressionType};
pub use config::VfsConfig;
pub use error::{DecompressError, Result, VfsError, WadError};
pub use extract::{ExtractItem, ExtractProgress, ExtractProgressCallback, ExtractReport, ExtractionEngine};
pub use hash_scan::ExtractHashesReport;
pub use jobs::JobHandle;
pub use reader::{ReadOptions, WadArchive, WadVersion};
pub use resolver::PathResolver;
pub use service::{MountProgress, MountProgressCallback, MountStage, MountedTree, VfsStatus, WadVfs};
pub use tree::{build_tree, DirNode, FileNode, SkipReason, SkippedEntry, TreeNode};

pub use ltk_hashtable::{CancellationToken, HashDictionary, HashFamily, WarmProgress, WarmReport};
