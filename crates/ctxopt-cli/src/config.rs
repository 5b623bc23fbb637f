//! CLI-layer configuration loading.
//!
//! Configuration is resolved with the following precedence (highest wins):
//!
//! 1. CLI flags
//! 2. Environment variables (`CTXOPT_*`)
//! 3. Project config (`.ctxopt/config.toml`)
//! 4. User config (`~/.config/ctxopt/config.toml`)
//! 5. Compiled-in defaults
//!
//! `ctxopt-core` itself never reads a file or an environment variable;
//! this precedence chain exists only so the demo binary can pick
//! sensible knobs without a flag for every single thing.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Effective CLI configuration after merging all sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Default token budget passed to `reconstruct_prompt` when `--budget` is omitted.
    #[serde(default = "CliConfig::default_budget")]
    pub default_budget: u32,

    /// Log level filter passed to `tracing_subscriber`.
    #[serde(default = "CliConfig::default_log_level")]
    pub log_level: String,

    /// Embedding dimension the demo `EmbeddingProvider` produces.
    #[serde(default = "CliConfig::default_embedding_dimension")]
    pub embedding_dimension: usize,
}

/// Partial view of [`CliConfig`] used to merge a config file in without
/// letting keys it omits revert fields already set by an earlier,
/// lower-precedence source.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    default_budget: Option<u32>,
    log_level: Option<String>,
    embedding_dimension: Option<usize>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_budget: Self::default_budget(),
            log_level: Self::default_log_level(),
            embedding_dimension: Self::default_embedding_dimension(),
        }
    }
}

impl CliConfig {
    fn default_budget() -> u32 {
        4_000
    }

    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_embedding_dimension() -> usize {
        32
    }

    /// Resolve configuration from user file, then project file, then
    /// environment, in that order (each step overlays the previous).
    /// CLI flags are applied by the caller afterward.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let mut config = Self::default();

        if let Some(user_config_dir) = dirs::config_dir() {
            let user_config_path = user_config_dir.join("ctxopt").join("config.toml");
            if user_config_path.exists() {
                config.merge_from_file(&user_config_path)?;
            }
        }

        let project_config_path = project_dir.join(".ctxopt").join("config.toml");
        if project_config_path.exists() {
            config.merge_from_file(&project_config_path)?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let overlay: ConfigOverlay = toml::from_str(&content)
            .with_context(|| format!("invalid TOML in {}", path.display()))?;
        if let Some(default_budget) = overlay.default_budget {
            self.default_budget = default_budget;
        }
        if let Some(log_level) = overlay.log_level {
            self.log_level = log_level;
        }
        if let Some(embedding_dimension) = overlay.embedding_dimension {
            self.embedding_dimension = embedding_dimension;
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(budget) = std::env::var("CTXOPT_DEFAULT_BUDGET") {
            if let Ok(parsed) = budget.parse() {
                self.default_budget = parsed;
            }
        }
        if let Ok(level) = std::env::var("CTXOPT_LOG_LEVEL") {
            self.log_level = level;
        }
    }
}

/// Write a starter `.ctxopt/config.toml` in `project_dir`, for the
/// `config --init` subcommand.
pub fn write_default_config(project_dir: &Path) -> Result<PathBuf> {
    let dir = project_dir.join(".ctxopt");
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join("config.toml");
    let toml_text = toml::to_string_pretty(&CliConfig::default())?;
    std::fs::write(&path, toml_text).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
