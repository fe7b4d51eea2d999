//! Text view of a chunk for quick inspection.

use std::fmt::Write;

use byteorder::{ByteOrder, LE};
use ltk_hashtable::{hash_wad_path, DictionarySnapshot, HashFamily};

use crate::hash_scan::{is_bin, scan_bin_strings};

const HEX_DUMP_LEN: usize = 256;

/// Renders chunk bytes as text.
///
/// - bin property files list their embedded asset paths, each with its hash
///   and whether the `game` family already knows it
/// - valid UTF-8 is returned unchanged
/// - anything else becomes a hex dump of the first 256 bytes
pub fn chunk_to_text(data: &[u8], snapshot: &DictionarySnapshot) -> String {
    if is_bin(data) {
        return bin_listing(data, snapshot);
    }
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => hex_dump(data),
    }
}

fn bin_listing(data: &[u8], snapshot: &DictionarySnapshot) -> String {
    let magic = String::from_utf8_lossy(&data[..4]);
    let version = data.get(4..8).map(LE::read_u32).unwrap_or_default();
    let paths = scan_bin_strings(data);

    let mut out = String::new();
    let _ = writeln!(out, "#{} v{} ({} bytes, {} embedded paths)", magic, version, data.len(), paths.len());
    for path in paths {
        let hash = hash_wad_path(&path);
        let marker = if snapshot.resolve(HashFamily::Game, hash).is_some() {
            ""
        } else {
            "  # unknown"
        };
        let _ = writeln!(out, "{:016x} {}{}", hash, path, marker);
    }
    out
}

fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# binary data, {} bytes", data.len());
    for (row, line) in data[..data.len().min(HEX_DUMP_LEN)].chunks(16).enumerate() {
        let hex = line.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ");
        let ascii = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect::<String>();
        let _ = writeln!(out, "{:08x}  {:<47}  |{}|", row * 16, hex, ascii);
    }
    if data.len() > HEX_DUMP_LEN {
        let _ = writeln!(out, "... {} more bytes", data.len() - HEX_DUMP_LEN);
    }
    out
}
