// src/provider/resolver.rs — Provider construction from env vars and model validation

use std::sync::Arc;

use super::anthropic::{resolve_model_alias, AnthropicProvider};
use super::openai::OpenAIProvider;
use super::retry::{RetryConfig, RetryProvider};
use super::{ModelProvider, ModelRef};
use crate::infra::errors::RlmError;

/// Build the provider named by `model_ref`, wrapped in retry.
///
/// Keys come from ANTHROPIC_API_KEY / OPENAI_API_KEY. OPENAI_BASE_URL and
/// ANTHROPIC_BASE_URL point the client at a compatible endpoint.
pub fn resolve_provider(
    model_ref: &ModelRef,
    retry: RetryConfig,
) -> Result<Arc<dyn ModelProvider>, RlmError> {
    resolve_provider_with(model_ref, retry, |var| std::env::var(var).ok())
}

/// Same as [`resolve_provider`] with an explicit variable lookup.
pub fn resolve_provider_with(
    model_ref: &ModelRef,
    retry: RetryConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn ModelProvider>, RlmError> {
    let key_var = api_key_var(&model_ref.provider)?;
    let key = lookup(key_var)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| RlmError::NoProvider {
            provider: model_ref.provider.clone(),
            env_var: key_var.to_string(),
        })?;

    let inner: Arc<dyn ModelProvider> = match model_ref.provider.as_str() {
        "anthropic" => match lookup("ANTHROPIC_BASE_URL") {
            Some(url) => Arc::new(AnthropicProvider::with_base_url(key, url)),
            None => Arc::new(AnthropicProvider::new(key)),
        },
        _ => match lookup("OPENAI_BASE_URL") {
            Some(url) => Arc::new(OpenAIProvider::with_base_url(key, url)),
            None => Arc::new(OpenAIProvider::new(key)),
        },
    };

    // Custom endpoints serve models outside the built-in catalog.
    let custom_endpoint = lookup("OPENAI_BASE_URL").is_some() && model_ref.provider == "openai";
    if !custom_endpoint {
        if let Err(e) = validate_model(inner.as_ref(), &model_ref.model) {
            tracing::warn!("{}", e);
        }
    }

    tracing::debug!(provider = inner.id(), model = %model_ref.model, "Resolved provider");
    Ok(Arc::new(RetryProvider::with_config(inner, retry)))
}

fn api_key_var(provider: &str) -> Result<&'static str, RlmError> {
    match provider {
        "anthropic" => Ok("ANTHROPIC_API_KEY"),
        "openai" => Ok("OPENAI_API_KEY"),
        other => Err(RlmError::UnknownProvider(other.to_string())),
    }
}

/// Validate that a model ID exists in the provider's model list.
///
/// Returns `Err(ModelValidationError)` with fuzzy suggestions if not found.
pub fn validate_model(
    provider: &dyn ModelProvider,
    model_id: &str,
) -> Result<String, ModelValidationError> {
    let models = provider.models();
    let wanted = resolve_model_alias(model_id);

    if models.iter().any(|m| m.id == wanted) {
        return Ok(wanted.to_string());
    }

    if let Some(m) = models.iter().find(|m| m.id.eq_ignore_ascii_case(wanted)) {
        return Ok(m.id.clone());
    }

    let mut scored: Vec<(&str, f64)> = models
        .iter()
        .map(|m| (m.id.as_str(), strsim::jaro_winkler(&m.id, wanted)))
        .filter(|(_, score)| *score > 0.7)
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(3);

    Err(ModelValidationError {
        provider_name: provider.name().to_string(),
        model_id: model_id.to_string(),
        suggestions: scored.iter().map(|(id, _)| id.to_string()).collect(),
    })
}

/// A model ID that doesn't match any catalog entry.
#[derive(Debug)]
pub struct ModelValidationError {
    pub provider_name: String,
    pub model_id: String,
    pub suggestions: Vec<String>,
}

impl std::fmt::Display for ModelValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Model '{}' is not in the {} catalog",
            self.model_id, self.provider_name
        )?;
        if !self.suggestions.is_empty() {
            write!(f, ". Did you mean: {}?", self.suggestions.join(", "))?;
        }
        Ok(())
    }
}
