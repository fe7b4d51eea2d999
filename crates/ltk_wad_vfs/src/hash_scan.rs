//! Discovery of new hash names inside archive content.
//!
//! Two sources are scanned:
//!
//! - bin property files (`PROP`/`PTCH`) embed asset paths as `u16` length
//!   prefixed strings; those become `game` hashes, together with the `2x_`/`4x_`
//!   texture variants and the `.py` twin of every `.bin`
//! - skinned meshes (`.skn`) list submesh names in fixed 80 byte records;
//!   those become `binhashes` entries

use std::collections::HashMap;

use byteorder::{ByteOrder, LE};
use ltk_hashtable::{hash_bin_name, hash_wad_path, CancellationToken};
use rayon::prelude::*;
use serde::Serialize;

use crate::chunk::CompressionType;
use crate::error::{Result, VfsError};
use crate::reader::{ReadOptions, WadArchive};

const PATH_PREFIXES: &[&[u8]] = &[
    b"assets/",
    b"data/",
    b"maps/",
    b"levels/",
    b"clientstates/",
    b"ux/",
    b"uiautoatlas/",
];
const MIN_PATH_LEN: usize = 8;
const MAX_PATH_LEN: usize = 300;

const SKN_MAGIC: u32 = 0x0011_2233;
const SKN_RANGE_SIZE: usize = 80;
const SKN_NAME_SIZE: usize = 64;
const SKN_MAX_RANGES: usize = 256;

/// Whether `data` starts like a bin property file.
pub fn is_bin(data: &[u8]) -> bool {
    data.starts_with(b"PROP") || data.starts_with(b"PTCH")
}

/// Extracts lowercased asset paths embedded in a bin file, without variants.
pub fn scan_bin_strings(data: &[u8]) -> Vec<String> {
    let mut found = Vec::new();
    if !is_bin(data) {
        return found;
    }

    let mut position = 0;
    while position + 2 <= data.len() {
        let len = LE::read_u16(&data[position..position + 2]) as usize;
        if (MIN_PATH_LEN..=MAX_PATH_LEN).contains(&len) {
            if let Some(path) = data
                .get(position + 2..position + 2 + len)
                .and_then(as_asset_path)
            {
                found.push(path.to_ascii_lowercase());
                position += 2 + len;
                continue;
            }
        }
        position += 1;
    }
    found
}

fn as_asset_path(bytes: &[u8]) -> Option<&str> {
    let is_path = bytes.is_ascii()
        && bytes.contains(&b'/')
        && PATH_PREFIXES
            .iter()
            .any(|prefix| bytes.len() >= prefix.len() && bytes[..prefix.len()].eq_ignore_ascii_case(prefix));
    if is_path {
        std::str::from_utf8(bytes).ok()
    } else {
        None
    }
}

/// Game hashes for every path in a bin file, including derived variants.
pub fn scan_bin_paths(data: &[u8]) -> Vec<(u64, String)> {
    let mut found = Vec::new();
    for path in scan_bin_strings(data) {
        if path.ends_with(".dds") {
            let split = path.rfind('/').map_or(0, |i| i + 1);
            let (dir, file) = path.split_at(split);
            for variant in [format!("{}2x_{}", dir, file), format!("{}4x_{}", dir, file)] {
                found.push((hash_wad_path(&variant), variant));
            }
        }
        if let Some(stem) = path.strip_suffix(".bin") {
            let py = format!("{}.py", stem);
            found.push((hash_wad_path(&py), py));
        }
        found.push((hash_wad_path(&path), path));
    }
    found
}

/// Submesh names of a skinned mesh, hashed for the `binhashes` family.
pub fn scan_skn_names(data: &[u8]) -> Vec<(u32, String)> {
    if data.len() < 12 || LE::read_u32(&data[0..4]) != SKN_MAGIC || LE::read_u16(&data[4..6]) == 0 {
        return Vec::new();
    }
    let range_count = LE::read_u32(&data[8..12]) as usize;
    if range_count == 0 || range_count > SKN_MAX_RANGES {
        return Vec::new();
    }

    data[12..]
        .chunks_exact(SKN_RANGE_SIZE)
        .take(range_count)
        .filter_map(|range| {
            let name = &range[..SKN_NAME_SIZE];
            let end = name.iter().position(|&b| b == 0).unwrap_or(SKN_NAME_SIZE);
            std::str::from_utf8(&name[..end]).ok()
        })
        .filter(|name| !name.is_empty())
        .map(|name| (hash_bin_name(name), name.to_string()))
        .collect()
}

/// Hashes discovered in one archive.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredHashes {
    pub game: HashMap<u64, String>,
    pub bin: HashMap<u64, String>,
}

/// Summary returned by [`WadVfs::extract_hashes`](crate::WadVfs::extract_hashes).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractHashesReport {
    pub game_hashes: usize,
    pub bin_hashes: usize,
    /// Hashes that were not yet in the on-disk extracted lists.
    pub new_hash_count: usize,
    pub chunks_scanned: usize,
    pub chunks_failed: usize,
}

/// Decompresses every embedded chunk and collects hashes from bins and meshes.
///
/// Chunks that fail to decompress are counted and skipped.
pub fn discover_hashes(
    archive: &WadArchive,
    options: ReadOptions,
    cancel: &CancellationToken,
) -> Result<(DiscoveredHashes, ExtractHashesReport)> {
    let scanned = archive
        .entries()
        .par_iter()
        .filter(|entry| entry.compression != CompressionType::Satellite)
        .map(|entry| {
            if cancel.is_cancelled() {
                return Err(VfsError::Cancelled);
            }
            match archive.load_chunk(entry, options, cancel) {
                Ok(data) => Ok(Some((scan_bin_paths(&data), scan_skn_names(&data)))),
                Err(error) => {
                    tracing::debug!("Skipping chunk #{} while scanning hashes: {}", entry.id, error);
                    Ok(None)
                }
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let mut discovered = DiscoveredHashes::default();
    let mut report = ExtractHashesReport {
        chunks_scanned: scanned.len(),
        ..Default::default()
    };
    for item in scanned {
        let Some((game, bin)) = item else {
            report.chunks_failed += 1;
            continue;
        };
        for (hash, path) in game {
            discovered.game.entry(hash).or_insert(path);
        }
        for (hash, name) in bin {
            discovered.bin.entry(hash as u64).or_insert(name);
        }
    }
    report.game_hashes = discovered.game.len();
    report.bin_hashes = discovered.bin.len();

    Ok((discovered, report))
}
