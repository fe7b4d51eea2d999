//! Error types for WAD virtual filesystem operations.
//!
//! Errors are layered the same way the pipeline is:
//!
//! - [`WadError`]: structural problems with the container itself. Fatal to a
//!   mount; a failed parse never reaches the archive cache.
//! - [`DecompressError`]: problems with one chunk's payload. Fatal to a single
//!   read, recorded per file during extraction.
//! - [`VfsError`]: everything an operation on [`WadVfs`](crate::WadVfs) can
//!   report, with the archive path and chunk id attached.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VfsError>;

/// Structural errors raised while parsing a WAD container.
#[derive(Error, Debug)]
pub enum WadError {
    /// The file does not start with the `RW` magic or its header is unreadable.
    #[error("Malformed WAD header: {0}")]
    MalformedHeader(String),

    /// The header carries a major version this reader does not understand.
    #[error("Unsupported WAD version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// The entry table extends past the end of the file.
    #[error("Truncated entry table: {entry_count} entries need {required} bytes but the file has {available}")]
    TruncatedTable {
        entry_count: u32,
        required: u64,
        available: u64,
    },

    /// An entry record could not be decoded.
    #[error("Invalid entry #{index}: {source}")]
    InvalidEntry {
        index: u32,
        #[source]
        source: DecompressError,
    },

    /// Underlying read failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<binrw::Error> for WadError {
    fn from(error: binrw::Error) -> Self {
        match error {
            binrw::Error::Io(io) => WadError::Io(io),
            other => WadError::MalformedHeader(other.to_string()),
        }
    }
}

/// Errors raised while turning a chunk's stored bytes into its content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompressError {
    /// Bad frame header, checksum mismatch or truncated input.
    #[error("Corrupt chunk data: {0}")]
    Corrupt(String),

    /// The entry's compression nibble is not a known codec.
    #[error("Unsupported compression type: {0}")]
    UnsupportedCodec(u8),

    /// A cancellation request was observed between frames.
    #[error("Decompression cancelled")]
    Cancelled,
}

/// Errors returned by virtual filesystem operations.
#[derive(Error, Debug)]
pub enum VfsError {
    /// The archive could not be opened or parsed.
    #[error("Failed to mount '{path}': {source}")]
    Wad {
        path: Utf8PathBuf,
        #[source]
        source: WadError,
    },

    /// A chunk's payload could not be produced.
    #[error("Chunk #{chunk_id} of '{path}': {source}")]
    Decompress {
        path: Utf8PathBuf,
        chunk_id: u32,
        #[source]
        source: DecompressError,
    },

    /// The chunk id is outside the archive's entry table.
    #[error("Chunk #{chunk_id} not found in '{path}'")]
    ChunkNotFound { path: Utf8PathBuf, chunk_id: u32 },

    /// The chunk is a satellite reference; its bytes live in another archive.
    #[error("Chunk #{chunk_id} is not embedded in this archive (stored in '{target}')")]
    NotEmbedded { chunk_id: u32, target: String },

    /// A path-based request referenced an archive that has no mounted tree.
    #[error("Archive is not mounted: {0}")]
    NotMounted(Utf8PathBuf),

    /// Filesystem access outside of the archive failed.
    #[error("IO error on '{path}': {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Loading or persisting hash lists failed.
    #[error(transparent)]
    Hashtable(#[from] ltk_hashtable::HashtableError),

    /// Failed to serialize or deserialize JSON (hashed file maps).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request itself is invalid (empty output directory, unsafe path, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The operation observed a cancellation request and stopped.
    #[error("Operation cancelled")]
    Cancelled,

    /// A background job panicked before producing a result.
    #[error("Background job '{0}' panicked")]
    JobPanicked(String),
}

impl VfsError {
    pub(crate) fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps a container error. Filesystem failures become [`VfsError::Io`]
    /// so only structural problems are reported as format errors.
    pub(crate) fn wad(path: impl Into<Utf8PathBuf>, source: impl Into<WadError>) -> Self {
        match source.into() {
            WadError::Io(source) => Self::Io {
                path: path.into(),
                source,
            },
            source => Self::Wad {
                path: path.into(),
                source,
            },
        }
    }
}
