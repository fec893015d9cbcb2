// src/provider/anthropic.rs — Anthropic Messages API provider

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ModelInfo, ModelProvider, Role, StopReason, TokenUsage};
use crate::infra::errors::RlmError;

const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Placeholder user turn when a transcript would otherwise open with an
/// assistant message. The Messages API requires a leading user turn.
const OPENING_USER_TURN: &str = "Begin.";

pub struct AnthropicProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: "https://api.anthropic.com/v1".into(),
        }
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn api_url(&self) -> String {
        format!("{}/messages", self.base_url)
    }

    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": resolve_model_alias(&request.model),
            "messages": alternate_roles(request),
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if let Some(system) = &request.system {
            body["system"] = serde_json::json!(system);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        body
    }
}

/// Map short model names to dated API ids.
pub fn resolve_model_alias(model: &str) -> &str {
    match model {
        "claude-sonnet" => "claude-sonnet-4-5-20250929",
        "claude-haiku" => "claude-3-5-haiku-20241022",
        other => other,
    }
}

/// Fold the transcript into strictly alternating user/assistant turns.
///
/// System messages are carried in `request.system` and skipped here. Tool
/// output is sent as user content. Consecutive same-role messages are merged.
fn alternate_roles(request: &ChatRequest) -> Vec<serde_json::Value> {
    let mut turns: Vec<(&'static str, String)> = Vec::new();

    for m in &request.messages {
        let role = match m.role {
            Role::System => continue,
            Role::User | Role::Tool => "user",
            Role::Assistant => "assistant",
        };
        match turns.last_mut() {
            Some((last_role, content)) if *last_role == role => {
                content.push_str("\n\n");
                content.push_str(&m.content);
            }
            _ => turns.push((role, m.content.clone())),
        }
    }

    if turns.first().map(|(r, _)| *r) != Some("user") {
        turns.insert(0, ("user", OPENING_USER_TURN.to_string()));
    }

    turns
        .into_iter()
        .map(|(role, content)| serde_json::json!({ "role": role, "content": content }))
        .collect()
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    fn name(&self) -> &str {
        "Anthropic"
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "claude-sonnet-4-5-20250929".into(),
                name: "Claude Sonnet 4.5".into(),
                context_window: 200_000,
                max_output_tokens: 64_000,
            },
            ModelInfo {
                id: "claude-opus-4-1-20250805".into(),
                name: "Claude Opus 4.1".into(),
                context_window: 200_000,
                max_output_tokens: 32_000,
            },
            ModelInfo {
                id: "claude-3-5-haiku-20241022".into(),
                name: "Claude 3.5 Haiku".into(),
                context_window: 200_000,
                max_output_tokens: 8_192,
            },
        ]
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, RlmError> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(self.api_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RlmError::Provider {
                provider: "anthropic".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5);
            return Err(RlmError::RateLimited {
                provider: "anthropic".into(),
                retry_after_ms: retry_after * 1000,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(RlmError::Provider {
                provider: "anthropic".into(),
                message: format!("HTTP {}: {}", status, error_body),
                // 529 is Anthropic's "overloaded"
                retriable: status.is_server_error() || status.as_u16() == 529,
            });
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| RlmError::Provider {
            provider: "anthropic".into(),
            message: format!("Failed to parse response: {}", e),
            retriable: false,
        })?;

        Ok(parse_response(&resp))
    }
}

fn parse_response(resp: &serde_json::Value) -> ChatResponse {
    let content = resp["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|c| c["type"] == "text")
                .filter_map(|c| c["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let usage = TokenUsage {
        input_tokens: resp["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
        output_tokens: resp["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
    };

    let stop_reason = match resp["stop_reason"].as_str() {
        Some("end_turn") => StopReason::EndTurn,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        _ => StopReason::Unknown,
    };

    ChatResponse {
        content,
        usage,
        stop_reason,
    }
}
