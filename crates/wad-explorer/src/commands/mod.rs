use camino::Utf8PathBuf;

use crate::errors::CliError;

pub mod config;
mod extract;
mod read;
mod tree;
mod warm;

pub use extract::{extract_hashes, extract_wad, ExtractHashesArgs, ExtractWadArgs};
pub use read::{read_chunk, read_chunk_text, ReadChunkArgs};
pub use tree::{show_tree, ShowTreeArgs};
pub use warm::warm_hashes;

/// Checks that `path` names an existing file before anything is mounted.
fn existing_file(path: &str) -> Result<Utf8PathBuf, CliError> {
    let path = Utf8PathBuf::from(path);
    if !path.is_file() {
        return Err(CliError::file_not_found(path));
    }
    Ok(path)
}
