//! Error types for hash dictionary operations.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HashtableError>;

/// Errors that can occur while loading or persisting hash lists.
#[derive(Error, Debug)]
pub enum HashtableError {
    /// Reading or writing a hash list failed.
    #[error("IO error on '{path}': {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The hash directory passed to a warm/prime call is not a directory.
    #[error("Not a hash directory: {0}")]
    NotADirectory(Utf8PathBuf),

    /// A family name did not match any known hash family.
    #[error("Unknown hash family: {0}")]
    InvalidFamily(String),

    /// A path could not be represented as UTF-8.
    #[error("Non UTF-8 path: {0}")]
    NonUtf8Path(String),
}

impl HashtableError {
    pub(crate) fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
