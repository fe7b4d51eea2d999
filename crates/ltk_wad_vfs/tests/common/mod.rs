//! Test-only WAD writer producing real v3.4 containers.

#![allow(dead_code)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::write::GzEncoder;
use flate2::Compression;

const HEADER_LEN: usize = 272;
const ENTRY_LEN: usize = 32;

struct StoredChunk {
    hash: u64,
    stored: Vec<u8>,
    decompressed_size: u32,
    kind: u8,
    first_subchunk: u16,
}

/// Builds a WAD container in memory. Entries keep insertion order.
#[derive(Default)]
pub struct TestWad {
    chunks: Vec<StoredChunk>,
}

impl TestWad {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, hash: u64, stored: Vec<u8>, decompressed_size: usize, kind: u8, first_subchunk: u16) -> Self {
        self.chunks.push(StoredChunk {
            hash,
            stored,
            decompressed_size: decompressed_size as u32,
            kind,
            first_subchunk,
        });
        self
    }

    pub fn raw(self, hash: u64, data: &[u8]) -> Self {
        self.push(hash, data.to_vec(), data.len(), 0, 0)
    }

    pub fn gzip(self, hash: u64, data: &[u8]) -> Self {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        self.push(hash, encoder.finish().unwrap(), data.len(), 1, 0)
    }

    pub fn zstd(self, hash: u64, data: &[u8]) -> Self {
        self.push(hash, zstd::bulk::compress(data, 3).unwrap(), data.len(), 3, 0)
    }

    /// A satellite reference to `target`.
    pub fn satellite(self, hash: u64, target: &str) -> Self {
        let mut stored = (target.len() as u32).to_le_bytes().to_vec();
        stored.extend_from_slice(target.as_bytes());
        self.push(hash, stored, 0, 2, 0)
    }

    /// One zstd-chunked entry whose stored bytes are one frame per part.
    pub fn chunked(self, hash: u64, subchunk: u16, parts: &[&[u8]]) -> Self {
        let mut stored = Vec::new();
        for part in parts {
            stored.extend(zstd::bulk::compress(part, 3).unwrap());
        }
        let size = parts.iter().map(|p| p.len()).sum();
        let kind = 4 | ((parts.len() as u8) << 4);
        self.push(hash, stored, size, kind, subchunk)
    }

    /// A zstd entry whose stored bytes are not a zstd frame.
    pub fn corrupt_zstd(self, hash: u64) -> Self {
        self.push(hash, b"definitely not zstd".to_vec(), 64, 3, 0)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = b"RW\x03\x04".to_vec();
        bytes.extend_from_slice(&[0u8; 256 + 8]);
        bytes.extend_from_slice(&(self.chunks.len() as u32).to_le_bytes());

        let mut offset = HEADER_LEN + self.chunks.len() * ENTRY_LEN;
        for chunk in &self.chunks {
            bytes.extend_from_slice(&chunk.hash.to_le_bytes());
            bytes.extend_from_slice(&(offset as u32).to_le_bytes());
            bytes.extend_from_slice(&(chunk.stored.len() as u32).to_le_bytes());
            bytes.extend_from_slice(&chunk.decompressed_size.to_le_bytes());
            bytes.push(chunk.kind);
            bytes.push(0);
            bytes.extend_from_slice(&chunk.first_subchunk.to_le_bytes());
            bytes.extend_from_slice(&xxhash_rust::xxh3::xxh3_64(&chunk.stored).to_le_bytes());
            offset += chunk.stored.len();
        }
        for chunk in &self.chunks {
            bytes.extend_from_slice(&chunk.stored);
        }
        bytes
    }

    pub fn write(&self, path: &Utf8Path) -> Utf8PathBuf {
        std::fs::write(path, self.to_bytes()).unwrap();
        path.to_path_buf()
    }
}

/// A scratch directory addressed with UTF-8 paths.
pub struct Scratch {
    _dir: tempfile::TempDir,
    pub path: Utf8PathBuf,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().canonicalize().unwrap()).unwrap();
        Self { _dir: dir, path }
    }

    pub fn join(&self, name: &str) -> Utf8PathBuf {
        self.path.join(name)
    }
}

/// Writes `hashes.<family>.txt` style lists into `dir`.
pub fn write_hash_list(dir: &Utf8Path, file_name: &str, entries: &[(u64, &str)]) {
    std::fs::create_dir_all(dir).unwrap();
    let mut text = String::new();
    for (hash, path) in entries {
        text.push_str(&format!("{:016x} {}\n", hash, path));
    }
    std::fs::write(dir.join(file_name), text).unwrap();
}

/// The two-entry archive used by most scenarios: `0xaaaa` is raw "hello",
/// `0xbbbb` is 100 gzipped zero bytes.
pub fn hello_wad() -> TestWad {
    TestWad::new().raw(0xaaaa, b"hello").gzip(0xbbbb, &[0u8; 100])
}
