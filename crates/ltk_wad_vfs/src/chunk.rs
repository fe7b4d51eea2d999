//! Chunk entries as stored in a WAD entry table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DecompressError;

/// How a chunk's bytes are stored, from the low nibble of the entry type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompressionType {
    /// Stored as-is.
    Raw,
    /// Gzip (deflate with a gzip header).
    Gzip,
    /// A reference to a file in another archive; the payload is a path.
    Satellite,
    /// One zstd frame.
    Zstd,
    /// A sequence of subchunks, each an independent zstd frame or raw bytes.
    ZstdChunked,
}

impl CompressionType {
    pub fn as_u8(self) -> u8 {
        match self {
            CompressionType::Raw => 0,
            CompressionType::Gzip => 1,
            CompressionType::Satellite => 2,
            CompressionType::Zstd => 3,
            CompressionType::ZstdChunked => 4,
        }
    }
}

impl TryFrom<u8> for CompressionType {
    type Error = DecompressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompressionType::Raw),
            1 => Ok(CompressionType::Gzip),
            2 => Ok(CompressionType::Satellite),
            3 => Ok(CompressionType::Zstd),
            4 => Ok(CompressionType::ZstdChunked),
            other => Err(DecompressError::UnsupportedCodec(other)),
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionType::Raw => "raw",
            CompressionType::Gzip => "gzip",
            CompressionType::Satellite => "satellite",
            CompressionType::Zstd => "zstd",
            CompressionType::ZstdChunked => "zstd-chunked",
        };
        f.write_str(name)
    }
}

/// One record of the entry table. Immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEntry {
    /// Position in the entry table; the chunk id used by every read API.
    pub id: u32,
    pub hash: u64,
    pub offset: u64,
    pub compressed_size: u32,
    pub decompressed_size: u32,
    pub compression: CompressionType,
    /// Whether the entry shares its data with another entry.
    pub is_duplicate: bool,
    /// First subchunk index, only for [`CompressionType::ZstdChunked`].
    pub subchunk_id: Option<u32>,
    /// Number of subchunks (high nibble of the type byte).
    pub subchunk_count: u8,
    /// Checksum of the stored bytes (xxh3 from 3.1 on, 0 when absent).
    pub checksum: u64,
}

impl ChunkEntry {
    /// End offset of the stored bytes.
    pub fn end(&self) -> u64 {
        self.offset + self.compressed_size as u64
    }
}
