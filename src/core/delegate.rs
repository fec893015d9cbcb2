// src/core/delegate.rs — Sub-model delegation
//
// `llm_query` inside the REPL lands here. Delegates never fail: transport
// errors come back as text the script can inspect, so one bad sub-call
// cannot abort the run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::types::{EventSink, RlmEvent, SliceSet};
use crate::provider::transport::{ModelTransport, Prompt};

/// Prefix of the text returned when the secondary model call fails.
pub const DELEGATE_ERROR_PREFIX: &str = "Error in sub-model call:";

/// Answers a prompt with the secondary model, optionally scoped to one slice.
pub trait Delegate: Send + Sync {
    fn completion(&self, prompt: &str, slice_id: Option<&str>) -> String;

    /// Calls issued so far, successful or not.
    fn call_count(&self) -> u64;
}

pub struct SubModelDelegate {
    transport: Arc<dyn ModelTransport>,
    slices: Arc<SliceSet>,
    max_tokens: u32,
    calls: AtomicU64,
}

impl SubModelDelegate {
    pub fn new(transport: Arc<dyn ModelTransport>, slices: Arc<SliceSet>, max_tokens: u32) -> Self {
        Self {
            transport,
            slices,
            max_tokens,
            calls: AtomicU64::new(0),
        }
    }

    /// The exact prompt sent for `(prompt, slice_id)`. An unknown slice id
    /// yields the unscoped prompt.
    pub fn scoped_prompt(&self, prompt: &str, slice_id: Option<&str>) -> String {
        let Some(id) = slice_id else {
            return prompt.to_string();
        };
        match self.slices.get(id) {
            Some(slice) => format!(
                "Context slice '{}':\n{}\n\n{}",
                slice.slice_id,
                slice.content_text(),
                prompt
            ),
            None => {
                tracing::debug!(slice_id = id, "Unknown slice id, sending unscoped prompt");
                prompt.to_string()
            }
        }
    }
}

impl Delegate for SubModelDelegate {
    fn completion(&self, prompt: &str, slice_id: Option<&str>) -> String {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let full = self.scoped_prompt(prompt, slice_id);

        match self.transport.complete(Prompt::Text(&full), self.max_tokens) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    model = self.transport.name(),
                    slice_id = slice_id.unwrap_or("-"),
                    "Sub-model call failed: {}",
                    e
                );
                format!("{} {}", DELEGATE_ERROR_PREFIX, e)
            }
        }
    }

    fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

/// Emits a `DelegateCall` event around every call of the wrapped delegate.
pub struct TracedDelegate<D: Delegate> {
    inner: D,
    slices: Arc<SliceSet>,
    sink: EventSink,
    call_id: String,
}

impl<D: Delegate> TracedDelegate<D> {
    pub fn new(inner: D, slices: Arc<SliceSet>, sink: EventSink, call_id: impl Into<String>) -> Self {
        Self {
            inner,
            slices,
            sink,
            call_id: call_id.into(),
        }
    }
}

impl<D: Delegate> Delegate for TracedDelegate<D> {
    fn completion(&self, prompt: &str, slice_id: Option<&str>) -> String {
        let start = Instant::now();
        let response = self.inner.completion(prompt, slice_id);

        (self.sink)(RlmEvent::DelegateCall {
            call_id: self.call_id.clone(),
            slice_id: slice_id.map(str::to_string),
            scoped: slice_id.is_some_and(|id| self.slices.contains(id)),
            prompt_chars: prompt.chars().count(),
            response_chars: response.chars().count(),
            failed: response.starts_with(DELEGATE_ERROR_PREFIX),
            elapsed_ms: start.elapsed().as_millis() as u64,
        });

        response
    }

    fn call_count(&self) -> u64 {
        self.inner.call_count()
    }
}
