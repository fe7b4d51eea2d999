//! Hash functions used by WAD archives and bin files.

use xxhash_rust::xxh64::xxh64;

use crate::family::HashFamily;

/// Hashes a WAD chunk path the way the game does: xxh64 of the lowercased path.
pub fn hash_wad_path(path: impl AsRef<str>) -> u64 {
    xxh64(path.as_ref().to_lowercase().as_bytes(), 0)
}

/// FNV-1a 32 over the ASCII-lowercased name, used for every bin family.
pub fn hash_bin_name(name: impl AsRef<str>) -> u32 {
    name.as_ref()
        .bytes()
        .map(|b| b.to_ascii_lowercase())
        .fold(0x811c_9dc5u32, |hash, b| {
            (hash ^ b as u32).wrapping_mul(0x0100_0193)
        })
}

/// Formats a hash with the zero padded width of its family.
pub fn format_hash(family: HashFamily, hash: u64) -> String {
    format!("{:0width$x}", hash, width = family.hex_width())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_wad_path_is_case_insensitive() {
        assert_eq!(
            hash_wad_path("DATA/Characters/Aatrox/Aatrox.bin"),
            hash_wad_path("data/characters/aatrox/aatrox.bin")
        );
        assert_eq!(hash_wad_path(""), xxh64(b"", 0));
    }

    #[test]
    fn test_hash_bin_name() {
        // Offset basis for the empty string
        assert_eq!(hash_bin_name(""), 0x811c9dc5);
        assert_eq!(hash_bin_name("a"), 0xe40c292c);
        assert_eq!(hash_bin_name("SkinCharacterDataProperties"), hash_bin_name("skincharacterdataproperties"));
    }

    #[test]
    fn test_format_hash_width() {
        assert_eq!(format_hash(HashFamily::Game, 0xaaaa), "000000000000aaaa");
        assert_eq!(format_hash(HashFamily::BinHashes, 0xaaaa), "0000aaaa");
    }
}
