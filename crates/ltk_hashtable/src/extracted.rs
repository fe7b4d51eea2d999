//! Persistence of hashes discovered inside archives.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;

use crate::error::{HashtableError, Result};
use crate::family::HashFamily;
use crate::hashing::format_hash;
use crate::table::FamilyTable;

/// Merges `entries` into the family's extracted list under `hash_dir`.
///
/// Existing lines win over new ones for the same hash. The file is rewritten
/// sorted by path and replaced atomically. Returns the path written and the
/// number of hashes that were not in the file before.
pub fn merge_extracted_file<'a>(
    hash_dir: impl AsRef<Utf8Path>,
    family: HashFamily,
    entries: impl IntoIterator<Item = (&'a u64, &'a String)>,
) -> Result<(Utf8PathBuf, usize)> {
    let hash_dir = hash_dir.as_ref();
    std::fs::create_dir_all(hash_dir).map_err(|source| HashtableError::io(hash_dir, source))?;
    let path = hash_dir.join(family.extracted_file_name());

    let mut table = if path.exists() {
        let file = File::open(&path).map_err(|source| HashtableError::io(&path, source))?;
        FamilyTable::parse(BufReader::new(file), family)
            .map_err(|source| HashtableError::io(&path, source))?
            .0
    } else {
        FamilyTable::new()
    };

    let mut added = 0;
    for (&hash, name) in entries {
        if table.get(hash).is_none() {
            table.insert(hash, name.clone());
            added += 1;
        }
    }

    let mut temp =
        tempfile::NamedTempFile::new_in(hash_dir).map_err(|source| HashtableError::io(hash_dir, source))?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        for (hash, name) in table
            .items()
            .iter()
            .sorted_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)))
        {
            writeln!(writer, "{} {}", format_hash(family, *hash), name)
                .map_err(|source| HashtableError::io(&path, source))?;
        }
        writer.flush().map_err(|source| HashtableError::io(&path, source))?;
    }
    temp.persist(&path)
        .map_err(|e| HashtableError::io(&path, e.error))?;

    tracing::info!("Wrote {} ({} new hashes)", path, added);
    Ok((path, added))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_merge_keeps_existing_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::write(dir.join("hashes.extracted.txt"), "0000000000000001 zeta/old.bin\n").unwrap();

        let entries = HashMap::from([
            (1u64, "zeta/new.bin".to_string()),
            (2u64, "alpha/a.dds".to_string()),
        ]);
        let (path, added) = merge_extracted_file(&dir, HashFamily::Game, &entries).unwrap();

        assert_eq!(added, 1);
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "0000000000000002 alpha/a.dds\n0000000000000001 zeta/old.bin\n"
        );
    }

    #[test]
    fn test_merge_bin_family_uses_short_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let entries = HashMap::from([(0xabcdu64, "Body".to_string())]);

        let (path, _) = merge_extracted_file(&dir, HashFamily::BinHashes, &entries).unwrap();
        assert!(path.ends_with("hashes.binhashes.extracted.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "0000abcd Body\n");
    }
}
