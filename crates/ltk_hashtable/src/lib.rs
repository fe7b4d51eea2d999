//! Hash dictionary for League of Legends asset names.
//!
//! WAD archives and bin property files never store names directly. WAD chunks
//! are keyed by the 64-bit xxHash of their lowercased path, and bin objects,
//! fields and types are keyed by a 32-bit FNV-1a hash. Community maintained
//! hash lists map those values back to readable names.
//!
//! This crate loads those lists into a process-wide [`HashDictionary`]:
//!
//! - **Families**: every list belongs to a [`HashFamily`] (`game`, `lcu`,
//!   `binentries`, ...), discovered from the `hashes.<family>.txt` naming scheme
//! - **Snapshots**: loads publish new tables atomically; resolvers work from an
//!   immutable [`DictionarySnapshot`] and never observe a half-loaded family
//! - **Warm cache**: tables stay resident between operations unless keep-alive
//!   is switched off or the cache is cleared
//! - **Extracted hashes**: names discovered inside archives can be merged back
//!   into `hashes.extracted.txt` style files
//!
//! # Example
//!
//! ```no_run
//! use ltk_hashtable::{CancellationToken, HashDictionary, HashFamily};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dictionary = HashDictionary::new();
//! let report = dictionary.warm_cache("hashes", None, &CancellationToken::new())?;
//! println!("loaded {} files", report.files_loaded);
//!
//! let hash = ltk_hashtable::hash_wad_path("data/characters/aatrox/aatrox.bin");
//! println!("{:?}", dictionary.resolve(HashFamily::Game, hash));
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod dictionary;
pub mod error;
pub mod extracted;
pub mod family;
pub mod hashing;
pub mod table;

pub use cancel::CancellationToken;
pub use dictionary::{
    DictionarySnapshot, DictionaryStatus, FamilyStatus, HashDictionary, LoadOutcome,
    WarmProgress, WarmProgressCallback, WarmReport,
};
pub use error::{HashtableError, Result};
pub use extracted::merge_extracted_file;
pub use family::HashFamily;
pub use hashing::{format_hash, hash_bin_name, hash_wad_path};
pub use table::{parse_hash_value, FamilyTable, ParseStats};
