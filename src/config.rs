use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cmd::Cmd;

/// Named commands and pipelines, loaded from `.cmdpipe.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default tracing filter when RUST_LOG is unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Name -> single command line
    #[serde(default)]
    pub commands: BTreeMap<String, String>,
    /// Name -> ordered command lines, stdout of each feeding the next
    #[serde(default)]
    pub pipelines: BTreeMap<String, Vec<String>>,

    // This field is not serialized, just used at runtime
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at '{}'", path))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config at '{}'", path))?;
        config.config_path = Some(PathBuf::from(path));
        Ok(config)
    }

    /// Load the config if the file exists, otherwise start empty.
    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| format!("Failed to serialize config for '{}'", path))?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config at '{}'", path))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, line) in &self.commands {
            if self.pipelines.contains_key(name) {
                anyhow::bail!("Name '{}' is used for both a command and a pipeline", name);
            }
            Cmd::parse(line).with_context(|| format!("Command '{}' is invalid", name))?;
        }

        for (name, lines) in &self.pipelines {
            if lines.is_empty() {
                anyhow::bail!("Pipeline '{}' cannot be empty", name);
            }
            for (stage, line) in lines.iter().enumerate() {
                Cmd::parse(line).with_context(|| {
                    format!("Stage {} of pipeline '{}' is invalid", stage + 1, name)
                })?;
            }
        }

        Ok(())
    }

    pub fn command(&self, name: &str) -> anyhow::Result<Cmd> {
        let line = self
            .commands
            .get(name)
            .ok_or_else(|| anyhow!("Command '{}' not found in config", name))?;
        Ok(Cmd::parse(line)?)
    }

    pub fn pipeline(&self, name: &str) -> anyhow::Result<Vec<Cmd>> {
        let lines = self
            .pipelines
            .get(name)
            .ok_or_else(|| anyhow!("Pipeline '{}' not found in config", name))?;
        lines
            .iter()
            .map(|line| Cmd::parse(line).map_err(Into::into))
            .collect()
    }

    /// A configured command name, or else a literal command line.
    pub fn resolve_command(&self, name_or_line: &str) -> anyhow::Result<Cmd> {
        if self.commands.contains_key(name_or_line) {
            return self.command(name_or_line);
        }
        Cmd::parse(name_or_line)
            .with_context(|| format!("Failed to parse command line '{}'", name_or_line))
    }
}
