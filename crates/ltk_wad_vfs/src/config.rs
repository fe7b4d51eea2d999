//! Runtime configuration of the virtual filesystem.

use serde::{Deserialize, Serialize};

use crate::reader::ReadOptions;

/// Settings shared by every operation of a [`WadVfs`](crate::WadVfs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VfsConfig {
    /// Largest stored chunk (in bytes) that is decompressed to guess the
    /// extension of an unresolved entry. Larger entries fall back to `.bin`.
    pub sniff_limit: u32,
    /// Verify stored chunk checksums before decompressing.
    pub verify_checksums: bool,
    /// Top level directory holding entries without a known name.
    pub unresolved_dir: String,
    /// Initial keep-alive state of the hash dictionary.
    pub keep_alive: bool,
    /// Longest file name extraction writes as-is.
    pub max_file_name_len: usize,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            sniff_limit: 1024 * 1024,
            verify_checksums: false,
            unresolved_dir: "unresolved".to_string(),
            keep_alive: true,
            max_file_name_len: 255,
        }
    }
}

impl VfsConfig {
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            verify_checksums: self.verify_checksums,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: VfsConfig = serde_json::from_str(r#"{"sniffLimit": 0}"#).unwrap();
        assert_eq!(config.sniff_limit, 0);
        assert_eq!(config.unresolved_dir, "unresolved");
        assert!(config.keep_alive);
    }
}
