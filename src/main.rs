mod cli;

use cli::{Cli, init_config};
use cmdpipe::config::Config;

use clap::{CommandFactory, Parser};
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let config_path = &cli.config;

    // Handle --init flag
    if cli.init {
        return init_config(config_path);
    }

    // Load config; a missing file just means no named commands
    let config = Config::load_or_default(config_path)?;
    config.validate()?;

    let default_level = if cli.verbose {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("warn")
    };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = &cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    cli::execute(command, &config, &mut std::io::stdout(), &mut std::io::stderr())
}
