// src/provider/roles.rs — Role-based model assignment

use super::ModelRef;
use crate::infra::errors::RlmError;

/// Assigns models to the two roles of a refinement run.
#[derive(Debug, Clone)]
pub struct ModelRoles {
    /// Drives the turn loop.
    pub root: ModelRef,
    /// Answers `llm_query` calls from inside the REPL.
    pub sub: ModelRef,
}

impl ModelRoles {
    pub fn from_single(model: ModelRef) -> Self {
        Self {
            root: model.clone(),
            sub: model,
        }
    }

    /// Build from explicit settings. CLI values win over config values; the
    /// sub model falls back to the root model.
    pub fn from_config(
        root: Option<&str>,
        sub: Option<&str>,
        default_root: &str,
    ) -> Result<Self, RlmError> {
        let root_str = root.unwrap_or(default_root);
        let root = ModelRef::parse(root_str)
            .ok_or_else(|| RlmError::InvalidModelRef(root_str.to_string()))?;
        let sub = match sub {
            Some(s) => ModelRef::parse(s).ok_or_else(|| RlmError::InvalidModelRef(s.to_string()))?,
            None => root.clone(),
        };
        Ok(Self { root, sub })
    }
}
