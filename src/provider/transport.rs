// src/provider/transport.rs — Synchronous completion seam used by the engine
//
// The refinement engine is strictly sequential and calls models from inside
// the scripting interpreter, so it talks to a blocking `ModelTransport`.
// `ProviderTransport` adapts any async `ModelProvider` to that seam by
// driving it on a tokio runtime handle. Call it from a blocking thread
// (e.g. `tokio::task::spawn_blocking`), never from inside an async task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{ChatRequest, Message, ModelProvider, ModelRef, Role, TokenUsage};
use crate::infra::errors::RlmError;

/// Input to a completion: a bare prompt or a role-tagged transcript.
#[derive(Debug, Clone, Copy)]
pub enum Prompt<'a> {
    Text(&'a str),
    Messages(&'a [Message]),
}

/// Blocking text completion against one model.
pub trait ModelTransport: Send + Sync {
    /// Human-readable label for logs (usually "provider/model").
    fn name(&self) -> &str;

    fn complete(&self, prompt: Prompt<'_>, max_tokens: u32) -> Result<String, RlmError>;

    /// Cumulative token usage across all calls.
    fn usage(&self) -> TokenUsage {
        TokenUsage::default()
    }

    /// Number of completed calls.
    fn call_count(&self) -> u64 {
        0
    }
}

pub struct ProviderTransport {
    provider: Arc<dyn ModelProvider>,
    model: String,
    label: String,
    temperature: Option<f32>,
    handle: tokio::runtime::Handle,
    usage: Mutex<TokenUsage>,
    calls: AtomicU64,
}

impl ProviderTransport {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        model: &ModelRef,
        handle: tokio::runtime::Handle,
    ) -> Self {
        Self {
            provider,
            model: model.model.clone(),
            label: model.to_string(),
            temperature: None,
            handle,
            usage: Mutex::new(TokenUsage::default()),
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Shape a prompt into a provider request. System messages are folded
    /// into the request's system field.
    pub fn build_request(&self, prompt: Prompt<'_>, max_tokens: u32) -> ChatRequest {
        let (system, messages) = match prompt {
            Prompt::Text(text) => (None, vec![Message::user(text)]),
            Prompt::Messages(msgs) => {
                let system: Vec<&str> = msgs
                    .iter()
                    .filter(|m| m.role == Role::System)
                    .map(|m| m.content.as_str())
                    .collect();
                let rest: Vec<Message> = msgs
                    .iter()
                    .filter(|m| m.role != Role::System)
                    .cloned()
                    .collect();
                let system = if system.is_empty() {
                    None
                } else {
                    Some(system.join("\n\n"))
                };
                (system, rest)
            }
        };

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: Some(max_tokens),
            temperature: self.temperature,
            system,
        }
    }
}

impl ModelTransport for ProviderTransport {
    fn name(&self) -> &str {
        &self.label
    }

    fn complete(&self, prompt: Prompt<'_>, max_tokens: u32) -> Result<String, RlmError> {
        let request = self.build_request(prompt, max_tokens);
        let response = self.handle.block_on(self.provider.chat(request))?;

        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut usage) = self.usage.lock() {
            usage.add(&response.usage);
        }

        tracing::debug!(
            model = %self.label,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Completion finished"
        );

        Ok(response.content)
    }

    fn usage(&self) -> TokenUsage {
        self.usage.lock().map(|u| u.clone()).unwrap_or_default()
    }

    fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}
