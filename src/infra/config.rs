// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub slicing: SlicingConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub root: Option<String>,
    /// Secondary model for `llm_query`. Falls back to `root` when unset.
    pub sub: Option<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            root: Some("anthropic/claude-sonnet-4-5-20250929".into()),
            sub: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    pub max_turns: u32,
    pub root_max_tokens: u32,
    pub sub_max_tokens: u32,
    pub max_output_chars: usize,
    pub max_output_lines: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_turns: 20,
            root_max_tokens: 8192,
            sub_max_tokens: 8192,
            max_output_chars: 100_000,
            max_output_lines: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlicingConfig {
    pub item_threshold: usize,
    pub sequence_chunk_size: usize,
    pub text_chunk_chars: usize,
    pub max_heading_level: u8,
}

impl Default for SlicingConfig {
    fn default() -> Self {
        Self {
            item_threshold: 10,
            sequence_chunk_size: 10,
            text_chunk_chars: 10_000,
            max_heading_level: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_function_expr_depth: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub max_retries: u32,
    pub temperature: Option<f32>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            temperature: None,
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        match paths::config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }
}
