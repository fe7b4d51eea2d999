//! File type detection from leading bytes, used to name unresolved chunks.

const PREFIX_TO_EXT: &[(&[u8], &str)] = &[
    (b"\xff\xd8\xff", "jpg"),
    (b"\x89PNG\x0d\x0a\x1a\x0a", "png"),
    (b"OggS", "ogg"),
    (b"\x00\x01\x00\x00", "ttf"),
    (b"\x1a\x45\xdf\xa3", "webm"),
    (b"OTTO\0", "otf"),
    (b"\"use strict\";", "min.js"),
    (b"<template ", "template.html"),
    (b"<!-- Elements -->", "template.html"),
    (b"DDS ", "dds"),
    (b"<svg", "svg"),
    (b"PROP", "bin"),
    (b"PTCH", "bin"),
    (b"BKHD", "bnk"),
    (b"r3d2Mesh", "scb"),
    (b"r3d2anmd", "anm"),
    (b"r3d2canm", "anm"),
    (b"r3d2sklt", "skl"),
    (b"r3d2", "wpk"),
    (b"\x33\x22\x11\x00", "skn"),
    (b"PreLoadBuildingBlocks = {", "preload"),
    (b"\x1bLuaQ\x00\x01\x04\x04", "luabin"),
    (b"\x1bLuaQ\x00\x01\x04\x08", "luabin64"),
    (b"\x02\x3d\x00\x28", "troybin"),
    (b"[ObjectBegin]", "sco"),
    (b"OEGM", "mapgeo"),
    (b"TEX\0", "tex"),
];

/// Longest prefix worth looking at.
pub const SNIFF_LEN: usize = 32;

/// Guesses a file extension from the first bytes of decompressed content.
///
/// Falls back to JSON detection when no magic matches. Returns `None` for
/// empty or unrecognised data.
pub fn guess_extension(data: &[u8]) -> Option<&'static str> {
    if data.is_empty() {
        return None;
    }
    let head = &data[..data.len().min(SNIFF_LEN)];

    PREFIX_TO_EXT
        .iter()
        .find(|(prefix, _)| head.starts_with(prefix))
        .map(|(_, ext)| *ext)
        .or_else(|| looks_like_json(head).then_some("json"))
}

fn looks_like_json(head: &[u8]) -> bool {
    // BOM prefixed JSON is not detected
    match serde_json::from_slice::<serde_json::Value>(head) {
        Ok(_) => true,
        Err(e) => e.is_eof(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_magics() {
        assert_eq!(guess_extension(b"DDS \x7c\x00\x00\x00"), Some("dds"));
        assert_eq!(guess_extension(b"PROP\x03\x00\x00\x00"), Some("bin"));
        assert_eq!(guess_extension(b"r3d2sklt\x00"), Some("skl"));
        assert_eq!(guess_extension(b"r3d2\x01\x00\x00\x00"), Some("wpk"));
        assert_eq!(guess_extension(&[0x33, 0x22, 0x11, 0x00, 0x04, 0x00]), Some("skn"));
        assert_eq!(guess_extension(b"TEX\0\x10\x00"), Some("tex"));
    }

    #[test]
    fn test_json_fallback() {
        assert_eq!(guess_extension(br#"{"name": "a very long json document that is cut"#), Some("json"));
        assert_eq!(guess_extension(b"[1, 2, 3]"), Some("json"));
    }

    #[test]
    fn test_unknown_data() {
        assert_eq!(guess_extension(&[]), None);
        assert_eq!(guess_extension(&[0u8; 100]), None);
        assert_eq!(guess_extension(b"plain text, nothing else"), None);
    }
}
