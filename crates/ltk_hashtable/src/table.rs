//! Line oriented hash list parsing.

use std::collections::HashMap;
use std::io::BufRead;

use crate::family::HashFamily;

/// The resident map of one hash family.
#[derive(Debug, Clone, Default)]
pub struct FamilyTable {
    items: HashMap<u64, String>,
}

/// Line counts gathered while parsing a hash list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Lines that produced an entry.
    pub loaded: usize,
    /// Non-empty, non-comment lines that could not be parsed.
    pub malformed: usize,
}

impl FamilyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `<hash> <path>` lines into a standalone table.
    ///
    /// Paths may contain spaces; everything after the first space is the path.
    /// Blank lines and `#` comments are ignored, malformed lines are counted
    /// and skipped.
    pub fn parse(reader: impl BufRead, family: HashFamily) -> std::io::Result<(Self, ParseStats)> {
        let mut table = Self::new();
        let mut stats = ParseStats::default();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((hash_str, path)) = line.split_once(' ') else {
                stats.malformed += 1;
                continue;
            };
            let Some(hash) = parse_hash_value(hash_str.trim(), family.hex_width()) else {
                stats.malformed += 1;
                continue;
            };
            if path.is_empty() {
                stats.malformed += 1;
                continue;
            }

            table.items.insert(hash, path.to_string());
            stats.loaded += 1;
        }

        Ok((table, stats))
    }

    /// Merges another table in. Entries already present are overwritten.
    pub fn extend(&mut self, other: FamilyTable) {
        if self.items.is_empty() {
            self.items = other.items;
        } else {
            self.items.extend(other.items);
        }
    }

    pub fn insert(&mut self, hash: u64, path: String) -> Option<String> {
        self.items.insert(hash, path)
    }

    pub fn get(&self, hash: u64) -> Option<&str> {
        self.items.get(&hash).map(String::as_str)
    }

    pub fn items(&self) -> &HashMap<u64, String> {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Parses a hash written as fixed-width hex, `0x` hex, decimal or bare hex.
///
/// A token exactly `hex_width` digits long is always read as hex, so zero
/// padded hashes made only of decimal digits are not misread.
pub fn parse_hash_value(s: &str, hex_width: usize) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    if s.len() != hex_width && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<u64>().ok();
    }
    u64::from_str_radix(s, 16).ok()
}
