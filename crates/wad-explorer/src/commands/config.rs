use crate::utils::config::{self, AppConfig};
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;

fn update_config(change: impl FnOnce(&mut AppConfig)) -> Result<()> {
    let mut cfg = config::load_config();
    change(&mut cfg);
    config::save_config(&cfg).map_err(|e| miette::miette!("Failed to save config: {}", e))
}

fn print_flag(name: &str, value: bool) {
    println!("  {} {}", format!("{}:", name).bright_white(), value);
}

pub fn show_config() -> Result<()> {
    let cfg = config::load_config();
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    println!();
    println!("  {} {}", "config_file:".bright_white(), config_path);

    match &cfg.hashtable_dir {
        Some(dir) => {
            let status = if dir.is_dir() {
                "✓".bright_green()
            } else {
                "✗".bright_red()
            };
            println!("  {} {} {}", "hashtable_dir:".bright_white(), dir, status);
        }
        None => println!(
            "  {} {}",
            "hashtable_dir:".bright_white(),
            "(not set)".bright_yellow()
        ),
    }
    print_flag("keep_alive", cfg.keep_alive);
    print_flag("replace_existing", cfg.replace_existing);

    println!();
    Ok(())
}

pub fn set_hashtable_dir(path: String) -> Result<()> {
    let path = Utf8PathBuf::from(&path);
    if !path.is_dir() {
        return Err(miette::miette!(
            "Hash list directory not found: {}\n\nIt should contain files like hashes.game.txt",
            path
        ));
    }

    update_config(|cfg| cfg.hashtable_dir = Some(path.clone()))?;

    println!(
        "{}",
        "✓ Hash list directory set successfully!".bright_green().bold()
    );
    println!();
    println!(
        "  {} {}",
        "Path:".bright_white().bold(),
        path.as_str().bright_green()
    );
    Ok(())
}

pub fn set_keep_alive(value: bool) -> Result<()> {
    update_config(|cfg| cfg.keep_alive = value)?;
    println!("{}", "✓ Configuration updated".bright_green().bold());
    print_flag("keep_alive", value);
    Ok(())
}

pub fn set_replace_existing(value: bool) -> Result<()> {
    update_config(|cfg| cfg.replace_existing = value)?;
    println!("{}", "✓ Configuration updated".bright_green().bold());
    print_flag("replace_existing", value);
    Ok(())
}

pub fn reset_config() -> Result<()> {
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    config::save_config(&AppConfig::default())
        .map_err(|e| miette::miette!("Failed to reset config: {}", e))?;

    println!(
        "{}",
        "✓ Configuration reset to defaults".bright_green().bold()
    );
    println!();
    println!("  {} {}", "Config file:".bright_white().bold(), config_path);
    println!();
    println!(
        "  {}",
        "Run 'wad-explorer config set-hashtable-dir <path>' to point at your hash lists"
            .bright_cyan()
    );
    Ok(())
}
