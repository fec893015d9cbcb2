// src/infra/errors.rs — Error types for rlm-refine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RlmError {
    // Transport errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // User errors
    #[error("No API key for provider '{provider}'. Set {env_var}.")]
    NoProvider { provider: String, env_var: String },

    #[error("Unknown provider '{0}' (expected 'anthropic' or 'openai')")]
    UnknownProvider(String),

    #[error("Invalid model reference '{0}' (expected provider/model)")]
    InvalidModelRef(String),

    #[error("Invalid context: {0}")]
    Context(String),

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RlmError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RlmError::Provider {
                retriable: true,
                ..
            } | RlmError::RateLimited { .. }
        )
    }
}
