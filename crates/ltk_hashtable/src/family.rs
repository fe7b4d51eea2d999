//! Hash families and the on-disk naming convention of their lists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HashtableError;

/// A group of hashes produced by the same algorithm for the same namespace.
///
/// Each family is backed by one or more `hashes.<family>*.txt` files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFamily {
    /// Game client WAD paths (`.wad.client`), xxh64 of the lowercased path.
    Game,
    /// League client WAD paths (`.wad`), xxh64 of the lowercased path.
    Lcu,
    /// Bin entry (object) path hashes, FNV-1a 32.
    BinEntries,
    /// Bin field name hashes, FNV-1a 32.
    BinFields,
    /// Bin hash values and mesh submesh names, FNV-1a 32.
    BinHashes,
    /// Bin class/type name hashes, FNV-1a 32.
    BinTypes,
}

impl HashFamily {
    pub const ALL: [HashFamily; 6] = [
        HashFamily::Game,
        HashFamily::Lcu,
        HashFamily::BinEntries,
        HashFamily::BinFields,
        HashFamily::BinHashes,
        HashFamily::BinTypes,
    ];

    /// The name used inside hash list file names.
    pub fn name(self) -> &'static str {
        match self {
            HashFamily::Game => "game",
            HashFamily::Lcu => "lcu",
            HashFamily::BinEntries => "binentries",
            HashFamily::BinFields => "binfields",
            HashFamily::BinHashes => "binhashes",
            HashFamily::BinTypes => "bintypes",
        }
    }

    /// Number of hex digits a hash of this family is printed with.
    pub fn hex_width(self) -> usize {
        match self {
            HashFamily::Game | HashFamily::Lcu => 16,
            _ => 8,
        }
    }

    /// Whether the family holds WAD path hashes (as opposed to bin hashes).
    pub fn is_wad_family(self) -> bool {
        matches!(self, HashFamily::Game | HashFamily::Lcu)
    }

    /// Canonical list file name, e.g. `hashes.game.txt`.
    pub fn file_name(self) -> String {
        format!("hashes.{}.txt", self.name())
    }

    /// File that receives hashes discovered inside archives.
    ///
    /// The game family keeps the historic `hashes.extracted.txt` name.
    pub fn extracted_file_name(self) -> String {
        match self {
            HashFamily::Game => "hashes.extracted.txt".to_string(),
            family => format!("hashes.{}.extracted.txt", family.name()),
        }
    }

    /// Maps a hash list file name to its family.
    ///
    /// Accepts `hashes.<family>.txt`, split lists (`hashes.<family>.txt.0`),
    /// extracted lists (`hashes.<family>.extracted.txt`) and the game family's
    /// `hashes.extracted.txt`. Anything else yields `None`.
    pub fn from_file_name(file_name: &str) -> Option<HashFamily> {
        let lower = file_name.to_ascii_lowercase();
        let rest = lower.strip_prefix("hashes.")?;

        let (stem, suffix) = match rest.split_once(".txt") {
            Some(parts) => parts,
            None => return None,
        };
        if !suffix.is_empty() {
            let index = suffix.strip_prefix('.')?;
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
        }

        match stem {
            "extracted" => Some(HashFamily::Game),
            stem => {
                let name = stem.strip_suffix(".extracted").unwrap_or(stem);
                name.parse().ok()
            }
        }
    }
}

impl fmt::Display for HashFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashFamily {
    type Err = HashtableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HashFamily::ALL
            .into_iter()
            .find(|family| family.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| HashtableError::InvalidFamily(s.to_string()))
    }
}
