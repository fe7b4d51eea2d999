use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    extract_hashes, extract_wad, read_chunk, read_chunk_text, show_tree, warm_hashes,
    ExtractHashesArgs, ExtractWadArgs, ReadChunkArgs, ShowTreeArgs,
};
use miette::Result;
use tracing_subscriber::EnvFilter;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON results instead of formatted output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the virtual directory tree of a WAD archive
    Tree {
        /// The path to the WAD archive
        wad: String,

        /// Directory holding hashes.<family>.txt lists (defaults to the configured one)
        #[arg(long)]
        hashtable_dir: Option<String>,

        /// Only show nodes up to this depth
        #[arg(short, long)]
        depth: Option<usize>,
    },
    /// Write the decompressed bytes of one chunk to a file or stdout
    Read {
        /// The path to the WAD archive
        wad: String,

        /// The chunk id (position in the entry table)
        chunk_id: u32,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Render one chunk as text
    Text {
        /// The path to the WAD archive
        wad: String,

        /// The chunk id (position in the entry table)
        chunk_id: u32,

        /// Directory holding hash lists used to annotate bin paths
        #[arg(long)]
        hashtable_dir: Option<String>,
    },
    /// Extract files or directories from a WAD archive
    Extract {
        /// The path to the WAD archive
        wad: String,

        /// Tree paths to extract; everything when omitted
        paths: Vec<String>,

        /// The directory to extract to
        #[arg(short, long, default_value = "extracted")]
        output_dir: String,

        /// Directory holding hashes.<family>.txt lists (defaults to the configured one)
        #[arg(long)]
        hashtable_dir: Option<String>,

        /// Skip files that already exist instead of overwriting them
        #[arg(long)]
        keep_existing: bool,
    },
    /// Discover new hashes inside a WAD archive and add them to the extracted lists
    ExtractHashes {
        /// The path to the WAD archive
        wad: String,

        /// Directory holding hash lists (defaults to the configured one)
        #[arg(long)]
        hashtable_dir: Option<String>,
    },
    /// Load every hash list once and report what was found
    Warm {
        /// Directory holding hash lists (defaults to the configured one)
        #[arg(long)]
        hashtable_dir: Option<String>,
    },
    /// Show or change the persisted configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the current configuration
    Show,
    /// Set the default hash list directory
    SetHashtableDir { path: String },
    /// Keep hash lists resident between operations
    SetKeepAlive {
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
    /// Overwrite existing files when extracting
    SetReplaceExisting {
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
    /// Reset the configuration to defaults
    Reset,
}

fn parse_args() -> Result<Args> {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).map_err(|e| miette::miette!("Failed to parse arguments: {}", e))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "wad_explorer=debug,ltk_wad_vfs=debug,ltk_hashtable=debug"
    } else {
        "wad_explorer=info,ltk_wad_vfs=info,ltk_hashtable=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = parse_args()?;
    init_logging(args.verbose);
    let json = args.json;

    match args.command {
        Commands::Tree {
            wad,
            hashtable_dir,
            depth,
        } => show_tree(ShowTreeArgs {
            wad,
            hashtable_dir,
            depth,
            json,
        }),
        Commands::Read {
            wad,
            chunk_id,
            output,
        } => read_chunk(ReadChunkArgs {
            wad,
            chunk_id,
            output,
            hashtable_dir: None,
            json,
        }),
        Commands::Text {
            wad,
            chunk_id,
            hashtable_dir,
        } => read_chunk_text(ReadChunkArgs {
            wad,
            chunk_id,
            output: None,
            hashtable_dir,
            json,
        }),
        Commands::Extract {
            wad,
            paths,
            output_dir,
            hashtable_dir,
            keep_existing,
        } => extract_wad(ExtractWadArgs {
            wad,
            paths,
            output_dir,
            hashtable_dir,
            keep_existing,
            json,
        }),
        Commands::ExtractHashes { wad, hashtable_dir } => extract_hashes(ExtractHashesArgs {
            wad,
            hashtable_dir,
            json,
        }),
        Commands::Warm { hashtable_dir } => warm_hashes(hashtable_dir, json),
        Commands::Config { action } => match action {
            ConfigCommands::Show => commands::config::show_config(),
            ConfigCommands::SetHashtableDir { path } => commands::config::set_hashtable_dir(path),
            ConfigCommands::SetKeepAlive { value } => commands::config::set_keep_alive(value),
            ConfigCommands::SetReplaceExisting { value } => {
                commands::config::set_replace_existing(value)
            }
            ConfigCommands::Reset => commands::config::reset_config(),
        },
    }
}
