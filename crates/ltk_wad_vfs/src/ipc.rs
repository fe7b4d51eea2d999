//! Request and response shapes for a message-passing front-end.
//!
//! Every boundary operation has a free function here taking a camelCase
//! request and returning an [`IpcResult`]. Errors never escape as Rust
//! errors; they are converted into an [`ErrorResponse`] with a stable code.

use camino::{Utf8Path, Utf8PathBuf};
use ltk_hashtable::{CancellationToken, WarmProgressCallback, WarmReport};
use serde::{Deserialize, Serialize};

use crate::error::VfsError;
use crate::extract::{ExtractItem, ExtractProgressCallback, ExtractReport};
use crate::hash_scan::ExtractHashesReport;
use crate::service::{MountProgressCallback, MountedTree, WadVfs};
use crate::tree::TreeNode;

/// Error codes that can be communicated across the boundary.
/// Serialized as SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The archive is not a readable WAD container
    WadFormat,
    /// A chunk's payload could not be decompressed
    Decompression,
    ChunkNotFound,
    /// The chunk lives in another archive
    NotEmbedded,
    NotMounted,
    Io,
    /// Hash lists could not be read or written
    Hashtable,
    Serialization,
    InvalidRequest,
    Cancelled,
    /// A background job failed unexpectedly
    Internal,
}

/// Structured error sent across the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Machine-readable error code for pattern matching
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional contextual data (archive path, chunk id, satellite target)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Serialize) -> Self {
        self.context = serde_json::to_value(context).ok();
        self
    }
}

impl From<VfsError> for ErrorResponse {
    fn from(error: VfsError) -> Self {
        let message = error.to_string();
        match error {
            VfsError::Wad { path, .. } => {
                ErrorResponse::new(ErrorCode::WadFormat, message).with_context(serde_json::json!({ "path": path }))
            }
            VfsError::Decompress { path, chunk_id, .. } => ErrorResponse::new(ErrorCode::Decompression, message)
                .with_context(serde_json::json!({ "path": path, "chunkId": chunk_id })),
            VfsError::ChunkNotFound { path, chunk_id } => ErrorResponse::new(ErrorCode::ChunkNotFound, message)
                .with_context(serde_json::json!({ "path": path, "chunkId": chunk_id })),
            VfsError::NotEmbedded { chunk_id, target } => ErrorResponse::new(ErrorCode::NotEmbedded, message)
                .with_context(serde_json::json!({ "chunkId": chunk_id, "target": target })),
            VfsError::NotMounted(path) => {
                ErrorResponse::new(ErrorCode::NotMounted, message).with_context(serde_json::json!({ "path": path }))
            }
            VfsError::Io { path, .. } => {
                ErrorResponse::new(ErrorCode::Io, message).with_context(serde_json::json!({ "path": path }))
            }
            VfsError::Hashtable(_) => ErrorResponse::new(ErrorCode::Hashtable, message),
            VfsError::Json(_) => ErrorResponse::new(ErrorCode::Serialization, message),
            VfsError::InvalidRequest(_) => ErrorResponse::new(ErrorCode::InvalidRequest, message),
            VfsError::Cancelled => ErrorResponse::new(ErrorCode::Cancelled, message),
            VfsError::JobPanicked(_) => ErrorResponse::new(ErrorCode::Internal, message),
        }
    }
}

/// Result of a boundary call.
///
/// Serializes to `{ "ok": true, "value": T }` or `{ "ok": false, "error": ErrorResponse }`.
#[derive(Debug, Clone, PartialEq)]
pub enum IpcResult<T> {
    Ok { value: T },
    Err { error: ErrorResponse },
}

// Custom serialization to use actual boolean values for the `ok` field
impl<T: Serialize> Serialize for IpcResult<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("IpcResult", 2)?;
        match self {
            IpcResult::Ok { value } => {
                state.serialize_field("ok", &true)?;
                state.serialize_field("value", value)?;
            }
            IpcResult::Err { error } => {
                state.serialize_field("ok", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

impl<T> IpcResult<T> {
    pub fn ok(value: T) -> Self {
        IpcResult::Ok { value }
    }

    pub fn err(error: impl Into<ErrorResponse>) -> Self {
        IpcResult::Err { error: error.into() }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, IpcResult::Ok { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> IpcResult<U> {
        match self {
            IpcResult::Ok { value } => IpcResult::Ok { value: f(value) },
            IpcResult::Err { error } => IpcResult::Err { error },
        }
    }
}

impl<T, E: Into<ErrorResponse>> From<Result<T, E>> for IpcResult<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => IpcResult::Ok { value },
            Err(e) => IpcResult::Err { error: e.into() },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountTreeRequest {
    pub wad_path: Utf8PathBuf,
    #[serde(default)]
    pub hash_path: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountTreeResponse {
    pub tree: TreeNode,
    pub chunk_count: u32,
    pub unresolved_count: u32,
}

impl From<&MountedTree> for MountTreeResponse {
    fn from(mounted: &MountedTree) -> Self {
        Self {
            tree: mounted.tree.clone(),
            chunk_count: mounted.chunk_count,
            unresolved_count: mounted.unresolved_count,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadChunkRequest {
    pub wad_path: Utf8PathBuf,
    pub chunk_id: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkDataResponse {
    pub data_base64: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BinTextResponse {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractHashesRequest {
    pub wad_path: Utf8PathBuf,
    pub hash_dir: Utf8PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractSelectedRequest {
    pub wad_path: Utf8PathBuf,
    pub items: Vec<ExtractItem>,
    pub output_dir: Utf8PathBuf,
    #[serde(default = "default_replace_existing")]
    pub replace_existing: bool,
}

fn default_replace_existing() -> bool {
    true
}

pub fn mount_tree(
    vfs: &WadVfs,
    request: &MountTreeRequest,
    progress: Option<MountProgressCallback>,
    cancel: &CancellationToken,
) -> IpcResult<MountTreeResponse> {
    vfs.mount_tree(&request.wad_path, request.hash_path.as_deref(), progress, cancel)
        .map(|mounted| MountTreeResponse::from(mounted.as_ref()))
        .into()
}

pub fn load_single_wad(vfs: &WadVfs, wad_path: &Utf8Path) -> IpcResult<MountTreeResponse> {
    vfs.load_single_wad(wad_path)
        .map(|mounted| MountTreeResponse::from(mounted.as_ref()))
        .into()
}

pub fn read_chunk_data(vfs: &WadVfs, request: &ReadChunkRequest) -> IpcResult<ChunkDataResponse> {
    vfs.read_chunk_base64(&request.wad_path, request.chunk_id)
        .map(|data_base64| ChunkDataResponse { data_base64 })
        .into()
}

pub fn read_bin_as_text(vfs: &WadVfs, request: &ReadChunkRequest) -> IpcResult<BinTextResponse> {
    vfs.read_bin_as_text(&request.wad_path, request.chunk_id)
        .map(|text| BinTextResponse { text })
        .into()
}

pub fn extract_hashes(vfs: &WadVfs, request: &ExtractHashesRequest) -> IpcResult<ExtractHashesReport> {
    vfs.extract_hashes(&request.wad_path, &request.hash_dir).into()
}

pub fn extract_selected(
    vfs: &WadVfs,
    request: &ExtractSelectedRequest,
    progress: Option<ExtractProgressCallback>,
    cancel: &CancellationToken,
) -> IpcResult<ExtractReport> {
    vfs.extract_selected(
        &request.wad_path,
        &request.items,
        &request.output_dir,
        request.replace_existing,
        progress,
        cancel,
    )
    .into()
}

pub fn warm_cache(
    vfs: &WadVfs,
    hash_dir: &Utf8Path,
    progress: Option<WarmProgressCallback>,
    cancel: &CancellationToken,
) -> IpcResult<WarmReport> {
    vfs.warm_cache(hash_dir, progress, cancel).into()
}

pub fn prime_wad(vfs: &WadVfs, hash_dir: &Utf8Path) -> IpcResult<WarmReport> {
    vfs.prime_wad(hash_dir).into()
}

pub fn set_keep_alive(vfs: &WadVfs, keep_alive: bool) -> IpcResult<()> {
    vfs.set_keep_alive(keep_alive);
    IpcResult::ok(())
}

pub fn clear_cache(vfs: &WadVfs) -> IpcResult<()> {
    vfs.clear_cache();
    IpcResult::ok(())
}
