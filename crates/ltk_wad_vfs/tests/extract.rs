mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use camino::Utf8Path;
use common::{hello_wad, write_hash_list, Scratch, TestWad};
use ltk_hashtable::hash_wad_path;
use ltk_wad_vfs::extract::HASHED_FILES_NAME;
use ltk_wad_vfs::{CancellationToken, ExtractItem, HashFamily, VfsConfig, WadVfs};

fn mount_hello(scratch: &Scratch, vfs: &WadVfs) -> camino::Utf8PathBuf {
    let wad = hello_wad().write(&scratch.join("Test.wad.client"));
    let hashes = scratch.join("hashes");
    write_hash_list(&hashes, "hashes.game.txt", &[(0xaaaa, "data/a.txt")]);
    vfs.mount_tree(&wad, Some(&hashes), None, &CancellationToken::new())
        .unwrap();
    wad
}

fn count_files(dir: &Utf8Path) -> usize {
    walk(dir.as_std_path())
}

fn walk(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path)
            } else {
                1
            }
        })
        .sum()
}

#[test]
fn test_extract_both_files() {
    let scratch = Scratch::new();
    let vfs = WadVfs::default();
    let wad = mount_hello(&scratch, &vfs);
    let out = scratch.join("out");

    let report = vfs
        .extract_selected(
            &wad,
            &[
                ExtractItem::file("data/a.txt"),
                ExtractItem::file("unresolved/000000000000bbbb.bin"),
            ],
            &out,
            true,
            None,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.extracted_count, 2);
    assert_eq!(report.skipped_count, 0);
    assert!(report.failures.is_empty());
    assert!(!report.cancelled);
    assert_eq!(std::fs::read(out.join("data/a.txt")).unwrap(), b"hello");
    assert_eq!(
        std::fs::read(out.join("unresolved/000000000000bbbb.bin")).unwrap(),
        vec![0u8; 100]
    );
}

#[test]
fn test_extract_is_idempotent() {
    let scratch = Scratch::new();
    let vfs = WadVfs::default();
    let wad = mount_hello(&scratch, &vfs);
    let out = scratch.join("out");
    let cancel = CancellationToken::new();
    let root = [ExtractItem::directory("")];

    let first = vfs.extract_selected(&wad, &root, &out, true, None, &cancel).unwrap();
    let second = vfs.extract_selected(&wad, &root, &out, true, None, &cancel).unwrap();
    assert_eq!(first, second);
    assert_eq!(std::fs::read(out.join("data/a.txt")).unwrap(), b"hello");

    let kept = vfs.extract_selected(&wad, &root, &out, false, None, &cancel).unwrap();
    assert_eq!(kept.extracted_count, 0);
    assert_eq!(kept.skipped_count, first.extracted_count);
    assert_eq!(count_files(&out), 2);
}

#[test]
fn test_directory_selection_and_missing_paths() {
    let scratch = Scratch::new();
    let vfs = WadVfs::default();
    let wad = mount_hello(&scratch, &vfs);
    let out = scratch.join("out");

    let report = vfs
        .extract_selected(
            &wad,
            &[
                ExtractItem::directory("data"),
                ExtractItem::file("data/a.txt"),
                ExtractItem::file("data/missing.txt"),
            ],
            &out,
            true,
            None,
            &CancellationToken::new(),
        )
        .unwrap();

    // the file selected twice is written once
    assert_eq!(report.extracted_count, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, "data/missing.txt");
    assert!(!out.join("unresolved").exists());
}

#[test]
fn test_partial_failure_reports_each_file() {
    let scratch = Scratch::new();
    let mut wad = TestWad::new();
    let mut names = Vec::new();
    for i in 0..100u64 {
        let hash = 0x1000 + i;
        wad = if i % 33 == 32 {
            wad.corrupt_zstd(hash)
        } else {
            wad.raw(hash, format!("file {}", i).as_bytes())
        };
        names.push((hash, format!("data/file_{:03}.txt", i)));
    }
    let wad = wad.write(&scratch.join("Partial.wad.client"));

    let vfs = WadVfs::default();
    vfs.hashes().merge_entries(HashFamily::Game, names.clone());
    let out = scratch.join("out");
    let report = vfs
        .extract_selected(
            &wad,
            &[ExtractItem::directory("data")],
            &out,
            true,
            None,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.extracted_count, 97);
    assert_eq!(report.failures.len(), 3);
    for failure in &report.failures {
        assert!(!out.join(&failure.path).exists());
    }
    assert_eq!(std::fs::read(out.join("data/file_000.txt")).unwrap(), b"file 0");
    assert_eq!(count_files(&out), 97);
}

#[test]
fn test_cancelled_extraction_writes_nothing() {
    let scratch = Scratch::new();
    let vfs = WadVfs::default();
    let wad = mount_hello(&scratch, &vfs);
    let out = scratch.join("out");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = vfs
        .extract_selected(&wad, &[ExtractItem::directory("")], &out, true, None, &cancel)
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.extracted_count, 0);
    assert_eq!(count_files(&out), 0);
}

#[test]
fn test_long_names_fall_back_to_hash() {
    let scratch = Scratch::new();
    let wad = hello_wad().write(&scratch.join("Test.wad.client"));
    let vfs = WadVfs::new(VfsConfig {
        max_file_name_len: 16,
        ..Default::default()
    });
    vfs.hashes().merge_entries(
        HashFamily::Game,
        [(0xaaaa, "data/a_rather_long_file_name.txt".to_string())],
    );
    let out = scratch.join("out");

    let report = vfs
        .extract_selected(
            &wad,
            &[ExtractItem::file("data/a_rather_long_file_name.txt")],
            &out,
            true,
            None,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.extracted_count, 1);
    assert_eq!(std::fs::read(out.join("000000000000aaaa.txt")).unwrap(), b"hello");

    let hashed: BTreeMap<String, String> =
        serde_json::from_str(&std::fs::read_to_string(out.join(HASHED_FILES_NAME)).unwrap()).unwrap();
    assert_eq!(
        hashed.get("000000000000aaaa.txt").map(String::as_str),
        Some("data/a_rather_long_file_name.txt")
    );
}

#[test]
fn test_unsafe_paths_are_rejected() {
    let scratch = Scratch::new();
    let wad = hello_wad().write(&scratch.join("Test.wad.client"));
    let vfs = WadVfs::default();
    vfs.hashes()
        .merge_entries(HashFamily::Game, [(0xaaaa, "../escape.txt".to_string())]);
    let out = scratch.join("out");

    let report = vfs
        .extract_selected(
            &wad,
            &[ExtractItem::directory("")],
            &out,
            true,
            None,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.extracted_count, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, "../escape.txt");
    assert!(!scratch.join("escape.txt").exists());
}

#[test]
fn test_background_extraction_reports_progress() {
    let scratch = Scratch::new();
    let vfs = Arc::new(WadVfs::default());
    let wad = mount_hello(&scratch, &vfs);
    let out = scratch.join("out");

    let job = vfs.spawn_extract_selected(wad, vec![ExtractItem::directory("")], out.clone(), true);
    let events = job.progress().iter().count();
    assert_eq!(events, 2);
    assert_eq!(job.join().unwrap().extracted_count, 2);
}

#[test]
fn test_extract_hashes_persists_and_merges() {
    let scratch = Scratch::new();
    let path = "data/characters/aatrox/aatrox.bin";
    let mut bin = b"PROP\x03\x00\x00\x00".to_vec();
    bin.extend_from_slice(&(path.len() as u16).to_le_bytes());
    bin.extend_from_slice(path.as_bytes());

    let wad = TestWad::new()
        .zstd(0x1, &bin)
        .raw(0x2, b"hello")
        .write(&scratch.join("Aatrox.wad.client"));
    let hashes = scratch.join("hashes");

    let vfs = WadVfs::default();
    let report = vfs.extract_hashes(&wad, &hashes).unwrap();
    assert_eq!(report.game_hashes, 2);
    assert_eq!(report.bin_hashes, 0);
    assert_eq!(report.new_hash_count, 2);
    assert_eq!(report.chunks_scanned, 2);

    let written = std::fs::read_to_string(hashes.join("hashes.extracted.txt")).unwrap();
    assert!(written.contains(path));
    assert!(written.contains("data/characters/aatrox/aatrox.py"));
    assert!(!hashes.join("hashes.binhashes.extracted.txt").exists());
    assert_eq!(
        vfs.hashes().resolve(HashFamily::Game, hash_wad_path(path)).as_deref(),
        Some(path)
    );

    let again = vfs.extract_hashes(&wad, &hashes).unwrap();
    assert_eq!(again.new_hash_count, 0);
}
