use std::sync::Arc;

use colored::Colorize;
use ltk_wad_vfs::{ipc, CancellationToken, WadVfs};
use miette::Result;

use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::load_config;
use crate::utils::print_json;

pub fn warm_hashes(hashtable_dir: Option<String>, json: bool) -> Result<()> {
    let cfg = load_config();
    let hash_dir = cfg
        .hashtable_dir_or(hashtable_dir.as_deref())
        .ok_or(CliError::HashtableDirNotSet)?;
    let vfs = Arc::new(WadVfs::new(cfg.vfs_config()));

    if json {
        return print_json(&ipc::warm_cache(&vfs, &hash_dir, None, &CancellationToken::new()));
    }

    println_pad!(
        "{} {}",
        "📚 Loading hash lists from".bright_blue().bold(),
        hash_dir.as_str().bright_cyan().bold()
    );

    let job = vfs.spawn_warm_cache(hash_dir);
    for progress in job.progress() {
        println_pad!(
            "{} {} {}",
            format!("[{}/{}]", progress.current, progress.total).dimmed(),
            progress.current_file,
            format!("({})", progress.family).dimmed()
        );
    }
    let report = job.join().map_err(CliError::from)?;

    for (path, reason) in &report.failures {
        println_pad!("{} {}: {}", "✗".bright_red(), path, reason);
    }
    for family in vfs.status().hashes.families {
        println_pad!(
            "  {} {}",
            format!("{}:", family.family).bright_white(),
            family.entries
        );
    }
    println_pad!(
        "{} {} entries from {} files ({} malformed lines)",
        "✅ Loaded".bright_green().bold(),
        report.entries_loaded,
        report.files_loaded,
        report.malformed_lines
    );
    Ok(())
}
