use camino::Utf8PathBuf;
use ltk_wad_vfs::VfsError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("No hash list directory configured")]
    #[diagnostic(
        code(config::hashtable_dir_missing),
        help("Pass --hashtable-dir or run 'wad-explorer config set-hashtable-dir <path>'")
    )]
    HashtableDirNotSet,

    #[error("File not found: {path}")]
    #[diagnostic(
        code(file::not_found),
        help("Make sure the file exists and the path is correct")
    )]
    FileNotFound { path: Utf8PathBuf },

    #[error("Chunk #{chunk_id} is stored in another archive: {target}")]
    #[diagnostic(
        code(wad::not_embedded),
        help("Open that archive instead to read this chunk")
    )]
    NotEmbedded { chunk_id: u32, target: String },

    #[error("{message}")]
    #[diagnostic(code(wad::error))]
    Vfs {
        message: String,
        #[source]
        source: VfsError,
    },

    #[error("Failed to write output")]
    #[diagnostic(code(io::operation_failed))]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl From<VfsError> for CliError {
    fn from(error: VfsError) -> Self {
        match error {
            VfsError::NotEmbedded { chunk_id, target } => Self::NotEmbedded { chunk_id, target },
            other => Self::Vfs {
                message: match &other {
                    VfsError::Wad { path, .. } => format!("Invalid WAD archive '{}'", path),
                    VfsError::Io { path, .. } => format!("Failed to access '{}'", path),
                    VfsError::Decompress { chunk_id, .. } => format!("Failed to decompress chunk #{}", chunk_id),
                    _ => "WAD operation failed".to_string(),
                },
                source: other,
            },
        }
    }
}

impl CliError {
    pub fn file_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }
}
