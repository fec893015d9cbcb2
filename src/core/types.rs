// src/core/types.rs — Core domain types

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::hypothesis::Hypothesis;
use super::sandbox::SandboxLimits;
use super::slicer::SlicerConfig;
use super::truncation::OutputLimits;
use crate::infra::errors::RlmError;
use crate::provider::Message;

// ─── Context ────────────────────────────────────────────────────────────────

/// Caller-supplied input, normalized once per call.
#[derive(Debug, Clone, PartialEq)]
pub enum Context {
    Text(String),
    Sequence(Vec<Value>),
    Mapping(Map<String, Value>),
}

impl Context {
    /// Normalize a JSON value. Scalars other than strings become their JSON text;
    /// `null` becomes empty text.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => Context::Text(s),
            Value::Array(items) => Context::Sequence(items),
            Value::Object(map) => Context::Mapping(map),
            Value::Null => Context::Text(String::new()),
            other => Context::Text(other.to_string()),
        }
    }

    /// Treat `raw` as JSON when it looks like an array or object and parses;
    /// otherwise as plain text.
    pub fn sniff(raw: String) -> Self {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            if let Ok(value) = serde_json::from_str::<Value>(&raw) {
                return Self::from_json(value);
            }
        }
        Context::Text(raw)
    }

    /// Load a context file. `.json` files must parse; anything else is text.
    pub fn load(path: &Path) -> Result<Self, RlmError> {
        let raw = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            let value: Value = serde_json::from_str(&raw).map_err(|e| {
                RlmError::Context(format!("{} is not valid JSON: {}", path.display(), e))
            })?;
            Ok(Self::from_json(value))
        } else {
            Ok(Context::Text(raw))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Context::Text(_) => "text",
            Context::Sequence(_) => "sequence",
            Context::Mapping(_) => "mapping",
        }
    }

    /// Characters for text, entries for sequences and mappings.
    pub fn size(&self) -> usize {
        match self {
            Context::Text(s) => s.chars().count(),
            Context::Sequence(items) => items.len(),
            Context::Mapping(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn to_value(&self) -> Value {
        match self {
            Context::Text(s) => Value::String(s.clone()),
            Context::Sequence(items) => Value::Array(items.clone()),
            Context::Mapping(map) => Value::Object(map.clone()),
        }
    }
}

impl From<&str> for Context {
    fn from(s: &str) -> Self {
        Context::Text(s.to_string())
    }
}

impl From<String> for Context {
    fn from(s: String) -> Self {
        Context::Text(s)
    }
}

impl From<Vec<Value>> for Context {
    fn from(items: Vec<Value>) -> Self {
        Context::Sequence(items)
    }
}

impl From<Vec<String>> for Context {
    fn from(items: Vec<String>) -> Self {
        Context::Sequence(items.into_iter().map(Value::String).collect())
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Context::Mapping(map)
    }
}

impl From<Value> for Context {
    fn from(value: Value) -> Self {
        Context::from_json(value)
    }
}

// ─── Slices ─────────────────────────────────────────────────────────────────

/// A named, independently addressable fragment of the context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSlice {
    pub slice_id: String,
    pub content: Value,
    pub metadata: Map<String, Value>,
}

impl ContextSlice {
    pub fn new(slice_id: impl Into<String>, content: Value, metadata: Map<String, Value>) -> Self {
        Self {
            slice_id: slice_id.into(),
            content,
            metadata,
        }
    }

    /// Content as prompt text: strings verbatim, structured values as pretty JSON.
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match &self.content {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "text",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Size in characters of the prompt text.
    pub fn content_size(&self) -> usize {
        match &self.content {
            Value::String(s) => s.chars().count(),
            _ => self.content_text().chars().count(),
        }
    }

    /// `{slice_id, metadata, content_type, content_size}` as exposed to scripts.
    pub fn info(&self) -> Value {
        serde_json::json!({
            "slice_id": self.slice_id,
            "metadata": self.metadata,
            "content_type": self.content_type(),
            "content_size": self.content_size(),
        })
    }
}

/// Ordered slices with unique ids.
#[derive(Debug, Clone, Default)]
pub struct SliceSet {
    slices: Vec<ContextSlice>,
    index: HashMap<String, usize>,
}

impl SliceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slice. A colliding id gets the first free `_2`, `_3`, ... suffix.
    /// Returns the id actually used.
    pub fn insert(&mut self, mut slice: ContextSlice) -> &str {
        if self.index.contains_key(&slice.slice_id) {
            let base = slice.slice_id.clone();
            let mut n = 2;
            while self.index.contains_key(&format!("{base}_{n}")) {
                n += 1;
            }
            slice.slice_id = format!("{base}_{n}");
        }
        let pos = self.slices.len();
        self.index.insert(slice.slice_id.clone(), pos);
        self.slices.push(slice);
        &self.slices[pos].slice_id
    }

    pub fn get(&self, slice_id: &str) -> Option<&ContextSlice> {
        self.index.get(slice_id).map(|&i| &self.slices[i])
    }

    pub fn contains(&self, slice_id: &str) -> bool {
        self.index.contains_key(slice_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.slices.iter().map(|s| s.slice_id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContextSlice> {
        self.slices.iter()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn infos(&self) -> Vec<Value> {
        self.slices.iter().map(ContextSlice::info).collect()
    }
}

// ─── Engine configuration ───────────────────────────────────────────────────

/// Runtime settings for one driver.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_turns: u32,
    pub root_max_tokens: u32,
    pub sub_max_tokens: u32,
    pub output: OutputLimits,
    pub slicer: SlicerConfig,
    pub sandbox: SandboxLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            root_max_tokens: 8192,
            sub_max_tokens: 8192,
            output: OutputLimits::default(),
            slicer: SlicerConfig::default(),
            sandbox: SandboxLimits::default(),
        }
    }
}

impl From<&crate::infra::config::Config> for EngineConfig {
    fn from(cfg: &crate::infra::config::Config) -> Self {
        Self {
            max_turns: cfg.engine.max_turns,
            root_max_tokens: cfg.engine.root_max_tokens,
            sub_max_tokens: cfg.engine.sub_max_tokens,
            output: OutputLimits {
                max_chars: cfg.engine.max_output_chars,
                max_lines: cfg.engine.max_output_lines,
            },
            slicer: SlicerConfig::from(&cfg.slicing),
            sandbox: SandboxLimits::from(&cfg.sandbox),
        }
    }
}

// ─── Events ─────────────────────────────────────────────────────────────────

/// Structured observer events. Observers never influence the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RlmEvent {
    CallStart {
        call_id: String,
        query: String,
        context_kind: String,
        context_size: usize,
        slice_count: usize,
        max_turns: u32,
    },
    TurnStart {
        call_id: String,
        turn: u32,
        max_turns: u32,
    },
    ModelResponse {
        call_id: String,
        turn: u32,
        response: String,
    },
    CodeExecuted {
        call_id: String,
        turn: u32,
        block: usize,
        code: String,
        output: String,
        failed: bool,
        truncated: bool,
    },
    DelegateCall {
        call_id: String,
        slice_id: Option<String>,
        scoped: bool,
        prompt_chars: usize,
        response_chars: usize,
        failed: bool,
        elapsed_ms: u64,
    },
    UnresolvedVariable {
        call_id: String,
        turn: u32,
        name: String,
    },
    TurnEnd {
        call_id: String,
        turn: u32,
        hypothesis: Option<String>,
        delegate_calls: u64,
    },
    BudgetExhausted {
        call_id: String,
        turns: u32,
    },
    FinalAnswer {
        call_id: String,
        answer: String,
        termination: Termination,
        turns: u32,
        root_calls: u32,
        delegate_calls: u64,
        elapsed_ms: u64,
    },
}

/// Shared observer callback.
pub type EventSink = Arc<dyn Fn(RlmEvent) + Send + Sync>;

/// Forward every event to each sink in order.
pub fn fan_out(sinks: Vec<EventSink>) -> EventSink {
    Arc::new(move |event: RlmEvent| {
        for sink in &sinks {
            sink(event.clone());
        }
    })
}

// ─── Outcome ────────────────────────────────────────────────────────────────

/// How a call reached its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// `FINAL(literal)`
    InlineAnswer,
    /// `FINAL_VAR(name)` resolved against the REPL namespace.
    VariableAnswer { name: String },
    /// Turn budget spent; answer came from the forced completion.
    BudgetExhausted,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::InlineAnswer => write!(f, "FINAL"),
            Termination::VariableAnswer { name } => write!(f, "FINAL_VAR({name})"),
            Termination::BudgetExhausted => write!(f, "budget exhausted"),
        }
    }
}

/// Everything a finished call produced.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub call_id: String,
    pub answer: String,
    pub termination: Termination,
    /// Loop turns executed (excludes the forced completion).
    pub turns: u32,
    /// Root model calls, including the forced completion.
    pub root_calls: u32,
    pub delegate_calls: u64,
    pub hypothesis: Hypothesis,
    pub transcript: Vec<Message>,
    pub slice_ids: Vec<String>,
}
