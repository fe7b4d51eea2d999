use std::sync::Arc;

use colored::Colorize;
use ltk_wad_vfs::ipc::{self, MountTreeRequest};
use ltk_wad_vfs::{CancellationToken, TreeNode, WadVfs};
use miette::Result;

use super::existing_file;
use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::load_config;
use crate::utils::{format_size, print_json};

pub struct ShowTreeArgs {
    pub wad: String,
    pub hashtable_dir: Option<String>,
    pub depth: Option<usize>,
    pub json: bool,
}

pub fn show_tree(args: ShowTreeArgs) -> Result<()> {
    let cfg = load_config();
    let wad_path = existing_file(&args.wad)?;
    let hash_dir = cfg.hashtable_dir_or(args.hashtable_dir.as_deref());
    if hash_dir.is_none() {
        tracing::warn!("No hash list directory configured, every entry gets a fallback name");
    }

    let vfs = Arc::new(WadVfs::new(cfg.vfs_config()));
    if args.json {
        let request = MountTreeRequest {
            wad_path,
            hash_path: hash_dir,
        };
        return print_json(&ipc::mount_tree(&vfs, &request, None, &CancellationToken::new()));
    }

    let job = vfs.spawn_mount_tree(wad_path.clone(), hash_dir);
    for progress in job.progress() {
        tracing::debug!("Mount stage: {:?}", progress.stage);
    }
    let mounted = job.join().map_err(CliError::from)?;

    println_pad!(
        "{} {}",
        "📦 Archive:".bright_blue().bold(),
        wad_path.as_str().bright_cyan().bold()
    );
    println_pad!(
        "{} {} chunks, {} unresolved",
        "🔎 Entries:".bright_yellow(),
        mounted.chunk_count,
        mounted.unresolved_count
    );
    if !mounted.skipped.is_empty() {
        println_pad!(
            "{} {} entries could not be placed (run with --verbose for details)",
            "⚠".bright_yellow(),
            mounted.skipped.len()
        );
    }
    println!();
    print_children(&mounted.tree, "", 1, args.depth);
    Ok(())
}

fn print_children(node: &TreeNode, prefix: &str, depth: usize, max_depth: Option<usize>) {
    let children = node.children();
    for (index, child) in children.iter().enumerate() {
        let last = index + 1 == children.len();
        let branch = if last { "└── " } else { "├── " };
        match child {
            TreeNode::Dir(dir) => {
                println!("{}{}{}", prefix, branch, format!("{}/", dir.name).bright_blue().bold());
                if max_depth.map_or(true, |max| depth < max) {
                    let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
                    print_children(child, &next, depth + 1, max_depth);
                }
            }
            TreeNode::File(file) => println!(
                "{}{}{} {}",
                prefix,
                branch,
                file.name,
                format!("({}, {})", format_size(file.decompressed_size), file.compression).dimmed()
            ),
        }
    }
}
