// src/core/hypothesis.rs — Evolving answer with version history

use serde::{Deserialize, Serialize};

/// The working answer a run refines turn over turn.
///
/// `history` holds every value that has been replaced, oldest first, and
/// never shrinks. The current value is not part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hypothesis {
    current: Option<String>,
    history: Vec<String>,
}

impl Hypothesis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive the current value (if any) and replace it.
    pub fn update(&mut self, value: impl Into<String>) {
        if let Some(prev) = self.current.take() {
            self.history.push(prev);
        }
        self.current = Some(value.into());
    }

    /// `None` until the first update.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }
}
