use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::Path;

use cmdpipe::cmd::Cmd;
use cmdpipe::config::Config;
use cmdpipe::{clipboard, pipeline, runner};

/// cmdpipe - run OS commands and process pipelines
#[derive(Parser, Debug)]
#[command(name = "cmdpipe")]
#[command(version)]
#[command(about = "Run OS commands and process pipelines")]
#[command(long_about = "cmdpipe runs external commands directly, without a shell.

Command lines are split with shell quoting rules, then each program is
looked up on PATH when it runs. Pipelines connect the stdout of each stage
to the stdin of the next through OS pipes.

Quick start:
  cmdpipe output 'ls -la'
  cmdpipe pipe 'printf \"b\\na\\n\"' sort
  cmdpipe --init          # write a starter .cmdpipe.toml
  cmdpipe pipe --name shout")]
pub struct Cli {
    /// Path to config file (defaults to .cmdpipe.toml)
    #[arg(short, long, default_value = ".cmdpipe.toml")]
    pub config: String,

    /// Write a starter config file and exit
    #[arg(long)]
    pub init: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Hand the terminal to a command (replaces this process where supported)
    Run {
        /// Command line or configured command name
        command: String,
    },
    /// Run a command as a child with inherited stdio and wait for it
    Spawn {
        /// Command line or configured command name
        command: String,
    },
    /// Run a command and print its combined stdout and stderr
    Output {
        /// Command line or configured command name
        command: String,
    },
    /// Run a pipeline: stdout of each stage feeds stdin of the next
    #[command(visible_alias = "p")]
    Pipe {
        /// Run a pipeline from the config file instead of the given stages
        #[arg(long, conflicts_with = "stages")]
        name: Option<String>,
        /// Stage command lines, in order
        stages: Vec<String>,
    },
    /// Copy text to the system clipboard
    Copy {
        /// Text to copy
        text: String,
    },
    /// Open a file, directory or URL
    Open {
        /// Location to open
        location: String,
    },
}

/// Resolve the stages for a `pipe` invocation.
pub fn pipe_stages(
    name: Option<&str>,
    stages: &[String],
    config: &Config,
) -> anyhow::Result<Vec<Cmd>> {
    match name {
        Some(name) => config.pipeline(name),
        None => stages
            .iter()
            .map(|stage| config.resolve_command(stage))
            .collect(),
    }
}

/// Run a subcommand, writing captured output to `out` and `err`.
pub fn execute(
    command: &Commands,
    config: &Config,
    out: &mut impl Write,
    err: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Commands::Run { command } => {
            runner::run(&config.resolve_command(command)?)?;
        }
        Commands::Spawn { command } => {
            runner::spawn(&config.resolve_command(command)?)?;
        }
        Commands::Output { command } => {
            let cmd = config.resolve_command(command)?;
            match runner::combined_output(&cmd) {
                Ok(output) => write!(out, "{}", output)?,
                Err(e) => {
                    write!(out, "{}", e.output)?;
                    return Err(e).with_context(|| format!("'{}' failed", cmd));
                }
            }
        }
        Commands::Pipe { name, stages } => {
            let cmds = pipe_stages(name.as_deref(), stages, config)?;
            match pipeline::pipeline(&cmds) {
                Ok(output) => {
                    write!(out, "{}", output.stdout)?;
                    write!(err, "{}", output.stderr)?;
                }
                Err(e) => {
                    write!(out, "{}", e.partial.stdout)?;
                    write!(err, "{}", e.partial.stderr)?;
                    return Err(e).context("Pipeline failed");
                }
            }
        }
        Commands::Copy { text } => {
            clipboard::copy(text).context("Failed to copy to clipboard")?;
        }
        Commands::Open { location } => {
            runner::open(location).with_context(|| format!("Failed to open '{}'", location))?;
        }
    }

    out.flush()?;
    err.flush()?;
    Ok(())
}

/// Write a starter config file unless one already exists.
pub fn init_config(config_path: &str) -> anyhow::Result<()> {
    if Path::new(config_path).exists() {
        println!("Config file '{}' already exists.", config_path);
        return Ok(());
    }

    let mut config = Config::default();
    config
        .commands
        .insert("today".to_string(), "date +%F".to_string());
    config.pipelines.insert(
        "shout".to_string(),
        vec!["echo 'hello from cmdpipe'".to_string(), "tr a-z A-Z".to_string()],
    );

    config
        .save(config_path)
        .with_context(|| format!("Failed to write config to '{}'", config_path))?;

    println!("Created {}", config_path);
    println!("\nNext steps:");
    println!("  1. Add your own [commands] and [pipelines] to {}", config_path);
    println!("  2. Run 'cmdpipe pipe --name shout'");

    Ok(())
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
