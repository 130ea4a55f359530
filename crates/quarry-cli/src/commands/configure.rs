//! Config command implementation.

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::{Config, OutputFormat};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::path::Path;

/// Execute the config command.
///
/// `config` is the effective configuration loaded from `path`.
pub fn execute_config(args: ConfigArgs, config: &Config, path: &Path, formatter: &Formatter) -> Result<()> {
    match args.action {
        ConfigAction::Show => show_config(config, formatter),
        ConfigAction::Init { force } => init_config(path, force, formatter),
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn show_config(config: &Config, formatter: &Formatter) -> Result<()> {
    let rendered = if formatter.format() == OutputFormat::Json {
        serde_json::to_string_pretty(config)?
    } else {
        config.to_toml()?
    };
    println!("{}", rendered);
    Ok(())
}

fn init_config(path: &Path, force: bool, formatter: &Formatter) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::InvalidInput(format!(
            "'{}' already exists (use --force to overwrite)",
            path.display()
        )));
    }

    Config::default().save_to(path)?;
    println!(
        "{}",
        formatter.success(&format!("Wrote default configuration to {}", path.display()))
    );
    Ok(())
}
