//! Quarry CLI - Extract product records from spreadsheets.

use clap::Parser;
use quarry_cli::cli::ConfigAction;
use quarry_cli::commands;
use quarry_cli::{Cli, Command, Config, Formatter};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> quarry_cli::Result<()> {
    let cli = Cli::parse();

    // Log to stderr so stdout stays machine-readable
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_path = Config::resolve_path(cli.config.as_deref())?;
    let config = match (&cli.command, Config::load_from(&config_path)) {
        (_, Ok(config)) => config,
        // `config init --force` and `config path` must work around a broken file
        (Command::Config(args), Err(e)) if !matches!(args.action, ConfigAction::Show) => {
            warn!("Ignoring unreadable configuration: {}", e);
            Config::default()
        }
        (_, Err(e)) => return Err(e),
    };

    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Extract(args) => commands::execute_extract(args, &config, &formatter).await?,
        Command::Reconcile(args) => commands::execute_reconcile(args, &config, &formatter).await?,
        Command::Plan(args) => commands::execute_plan(args, &formatter)?,
        Command::Config(args) => commands::execute_config(args, &config, &config_path, &formatter)?,
    }

    Ok(())
}
