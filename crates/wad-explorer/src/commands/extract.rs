use std::sync::Arc;

use camino::Utf8PathBuf;
use colored::Colorize;
use ltk_wad_vfs::ipc::{self, ExtractHashesRequest, ExtractSelectedRequest};
use ltk_wad_vfs::{CancellationToken, ExtractItem, WadVfs};
use miette::Result;

use super::existing_file;
use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::load_config;
use crate::utils::print_json;

pub struct ExtractWadArgs {
    pub wad: String,
    pub paths: Vec<String>,
    pub output_dir: String,
    pub hashtable_dir: Option<String>,
    pub keep_existing: bool,
    pub json: bool,
}

pub fn extract_wad(args: ExtractWadArgs) -> Result<()> {
    let cfg = load_config();
    let wad_path = existing_file(&args.wad)?;
    let hash_dir = cfg.hashtable_dir_or(args.hashtable_dir.as_deref());
    let replace_existing = cfg.replace_existing && !args.keep_existing;
    let output_dir = Utf8PathBuf::from(&args.output_dir);

    let vfs = Arc::new(WadVfs::new(cfg.vfs_config()));
    let cancel = CancellationToken::new();
    let mounted = vfs
        .mount_tree(&wad_path, hash_dir.as_deref(), None, &cancel)
        .map_err(CliError::from)?;

    let items = if args.paths.is_empty() {
        vec![ExtractItem::directory("")]
    } else {
        args.paths
            .iter()
            .map(|path| match mounted.tree.find(path) {
                Some(node) if node.is_dir() => ExtractItem::directory(path.as_str()),
                _ => ExtractItem::file(path.as_str()),
            })
            .collect()
    };

    if args.json {
        let request = ExtractSelectedRequest {
            wad_path,
            items,
            output_dir,
            replace_existing,
        };
        return print_json(&ipc::extract_selected(&vfs, &request, None, &cancel));
    }

    println_pad!(
        "{} {}",
        "📦 Extracting WAD:".bright_blue().bold(),
        wad_path.as_str().bright_cyan().bold()
    );
    println_pad!(
        "{} {}",
        "📁 Extracting to:".bright_yellow(),
        output_dir.as_str().bright_white().bold()
    );

    let job = vfs.spawn_extract_selected(wad_path, items, output_dir, replace_existing);
    for progress in job.progress() {
        tracing::debug!("[{}/{}] {}", progress.current, progress.total, progress.current_file);
    }
    let report = job.join().map_err(CliError::from)?;

    for failure in &report.failures {
        println_pad!("{} {}: {}", "✗".bright_red(), failure.path, failure.reason);
    }
    if !report.hashed_files.is_empty() {
        println_pad!(
            "{} {} files written under hashed names (see hashed_files.json)",
            "ℹ".bright_cyan(),
            report.hashed_files.len()
        );
    }
    println_pad!(
        "{} {} extracted, {} skipped, {} failed",
        "✅ Extraction complete!".bright_green().bold(),
        report.extracted_count,
        report.skipped_count,
        report.failures.len()
    );
    Ok(())
}

pub struct ExtractHashesArgs {
    pub wad: String,
    pub hashtable_dir: Option<String>,
    pub json: bool,
}

pub fn extract_hashes(args: ExtractHashesArgs) -> Result<()> {
    let cfg = load_config();
    let wad_path = existing_file(&args.wad)?;
    let hash_dir = cfg
        .hashtable_dir_or(args.hashtable_dir.as_deref())
        .ok_or(CliError::HashtableDirNotSet)?;
    let vfs = WadVfs::new(cfg.vfs_config());

    if args.json {
        let request = ExtractHashesRequest { wad_path, hash_dir };
        return print_json(&ipc::extract_hashes(&vfs, &request));
    }

    let report = vfs
        .extract_hashes(&wad_path, &hash_dir)
        .map_err(CliError::from)?;

    println_pad!(
        "{} {} game paths, {} bin names from {} chunks",
        "🔎 Found".bright_blue().bold(),
        report.game_hashes,
        report.bin_hashes,
        report.chunks_scanned
    );
    if report.chunks_failed > 0 {
        println_pad!(
            "{} {} chunks could not be read",
            "⚠".bright_yellow(),
            report.chunks_failed
        );
    }
    println_pad!(
        "{} {} new hashes written to {}",
        "✅".bright_green(),
        report.new_hash_count.to_string().bright_green().bold(),
        hash_dir.as_str().bright_white()
    );
    Ok(())
}
