//! Configuration file management for rcm.
//!
//! Provides a TOML-based config file at `~/.config/rcm/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rcm_core::KnowledgeBase;
use rcm_core::generation::ClaudeCliConfig;
use rcm_core::generation::claude_cli::{DEFAULT_MAX_TOOL_ROUNDS, DEFAULT_TIMEOUT};

pub const ENV_CLAUDE_BIN: &str = "RCM_CLAUDE_BIN";
pub const ENV_MODEL: &str = "RCM_MODEL";
pub const ENV_KNOWLEDGE_BASE: &str = "RCM_KNOWLEDGE_BASE";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub generator: GeneratorSection,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratorSection {
    /// Path or name of the `claude` executable.
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            model: None,
            timeout_secs: default_timeout_secs(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

fn default_binary() -> String {
    "claude".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct KnowledgeBaseSection {
    /// TOML catalog replacing the built-in manuals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the rcm config directory: `$XDG_CONFIG_HOME/rcm` or `~/.config/rcm`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("rcm");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("rcm")
}

/// Return the path to the rcm config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load the config file if one exists. A file that exists but does not
/// parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(Some(config))
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line, which win over everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct CliOverrides<'a> {
    pub claude_bin: Option<&'a str>,
    pub model: Option<&'a str>,
    pub knowledge_base: Option<&'a Path>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct RcmConfig {
    pub generator: ClaudeCliConfig,
    /// `None` means the built-in knowledge base.
    pub knowledge_base: Option<PathBuf>,
}

impl RcmConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Binary: `--claude-bin` > `RCM_CLAUDE_BIN` > `generator.binary` > `claude`
    /// - Model: `--model` > `RCM_MODEL` > `generator.model` > CLI default
    /// - Knowledge base: `--knowledge-base` > `RCM_KNOWLEDGE_BASE` > `knowledge_base.path` > built-in
    ///
    /// Timeout and tool-round limits come from the file only.
    pub fn resolve(cli: CliOverrides<'_>) -> Result<Self> {
        let file = load_config()?.unwrap_or_default();

        let binary = cli
            .claude_bin
            .map(str::to_string)
            .or_else(|| env_var(ENV_CLAUDE_BIN))
            .unwrap_or(file.generator.binary);

        let model = cli
            .model
            .map(str::to_string)
            .or_else(|| env_var(ENV_MODEL))
            .or(file.generator.model);

        let knowledge_base = cli
            .knowledge_base
            .map(Path::to_path_buf)
            .or_else(|| env_var(ENV_KNOWLEDGE_BASE).map(PathBuf::from))
            .or(file.knowledge_base.path);

        Ok(Self {
            generator: ClaudeCliConfig {
                binary,
                model,
                timeout: Duration::from_secs(file.generator.timeout_secs),
                max_tool_rounds: file.generator.max_tool_rounds,
            },
            knowledge_base,
        })
    }

    /// Load the configured catalog, or the built-in one when none is set.
    pub fn load_knowledge_base(&self) -> Result<KnowledgeBase> {
        match &self.knowledge_base {
            Some(path) => KnowledgeBase::from_toml_file(path)
                .with_context(|| format!("failed to load knowledge base {}", path.display())),
            None => Ok(KnowledgeBase::builtin()),
        }
    }
}

/// Read an env var, treating an empty value as unset.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
