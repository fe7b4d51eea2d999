use std::io::Write;

use colored::Colorize;
use ltk_wad_vfs::ipc::{self, ReadChunkRequest};
use ltk_wad_vfs::WadVfs;
use miette::Result;

use super::existing_file;
use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config::load_config;
use crate::utils::{format_size, print_json};

pub struct ReadChunkArgs {
    pub wad: String,
    pub chunk_id: u32,
    pub output: Option<String>,
    pub hashtable_dir: Option<String>,
    pub json: bool,
}

pub fn read_chunk(args: ReadChunkArgs) -> Result<()> {
    let cfg = load_config();
    let wad_path = existing_file(&args.wad)?;
    let vfs = WadVfs::new(cfg.vfs_config());

    if args.json {
        let request = ReadChunkRequest {
            wad_path,
            chunk_id: args.chunk_id,
        };
        return print_json(&ipc::read_chunk_data(&vfs, &request));
    }

    let data = vfs
        .read_chunk_data(&wad_path, args.chunk_id)
        .map_err(CliError::from)?;

    match args.output {
        Some(output) => {
            std::fs::write(&output, &data).map_err(CliError::from)?;
            println_pad!(
                "{} {} ({})",
                "✅ Wrote".bright_green().bold(),
                output.bright_white().bold(),
                format_size(data.len() as u64)
            );
        }
        None => std::io::stdout()
            .lock()
            .write_all(&data)
            .map_err(CliError::from)?,
    }
    Ok(())
}

pub fn read_chunk_text(args: ReadChunkArgs) -> Result<()> {
    let cfg = load_config();
    let wad_path = existing_file(&args.wad)?;
    let vfs = WadVfs::new(cfg.vfs_config());

    if let Some(hash_dir) = cfg.hashtable_dir_or(args.hashtable_dir.as_deref()) {
        vfs.prime_wad(&hash_dir).map_err(CliError::from)?;
    }

    if args.json {
        let request = ReadChunkRequest {
            wad_path,
            chunk_id: args.chunk_id,
        };
        return print_json(&ipc::read_bin_as_text(&vfs, &request));
    }

    let text = vfs
        .read_bin_as_text(&wad_path, args.chunk_id)
        .map_err(CliError::from)?;
    println!("{}", text);
    Ok(())
}
