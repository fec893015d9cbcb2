// src/core/truncation.rs — REPL output truncation
//
// Bounds what a single code block can add to the transcript.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimits {
    pub max_chars: usize,
    pub max_lines: usize,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            max_chars: 100_000,
            max_lines: 2000,
        }
    }
}

/// Result of a truncation operation.
#[derive(Debug, Clone)]
pub struct TruncationResult {
    /// The (possibly truncated) content, with a trailing note when cut.
    pub content: String,
    pub was_truncated: bool,
    pub original_chars: usize,
    pub original_lines: usize,
}

/// Truncate by lines first, then by characters. Never splits a char.
pub fn truncate_output(content: &str, limits: OutputLimits) -> TruncationResult {
    truncate_counted(content, limits, content.chars().count(), content.lines().count())
}

/// Like `truncate_output`, but `content` may already be a prefix of a longer
/// output whose size is given by `original_chars` and `original_lines`.
fn truncate_counted(
    content: &str,
    limits: OutputLimits,
    original_chars: usize,
    original_lines: usize,
) -> TruncationResult {
    if original_chars <= limits.max_chars && original_lines <= limits.max_lines {
        return TruncationResult {
            content: content.to_string(),
            was_truncated: false,
            original_chars,
            original_lines,
        };
    }

    let mut truncated = if content.lines().count() > limits.max_lines {
        content
            .lines()
            .take(limits.max_lines)
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        content.to_string()
    };

    if let Some((cut, _)) = truncated.char_indices().nth(limits.max_chars) {
        truncated.truncate(cut);
    }

    let note = format!(
        "\n\n[Output truncated: {} chars, {} lines. Showing the first {} chars. Store large values in variables and inspect them in pieces.]",
        original_chars,
        original_lines,
        truncated.chars().count()
    );

    TruncationResult {
        content: format!("{}{}", truncated, note),
        was_truncated: true,
        original_chars,
        original_lines,
    }
}

/// Capture buffer for a running fragment. Stops storing text one char past
/// the limits but keeps counting, so memory stays bounded however much the
/// fragment prints.
#[derive(Debug, Default)]
pub struct BoundedOutput {
    limits: OutputLimits,
    kept: String,
    kept_chars: usize,
    kept_lines: usize,
    total_chars: usize,
    total_lines: usize,
    dropped: bool,
}

impl BoundedOutput {
    pub fn new(limits: OutputLimits) -> Self {
        Self {
            limits,
            ..Default::default()
        }
    }

    pub fn push(&mut self, text: &str) {
        let chars = text.chars().count();
        let lines = text.matches('\n').count();
        self.total_chars += chars;
        self.total_lines += lines;
        if self.dropped {
            return;
        }

        let room = (self.limits.max_chars + 1).saturating_sub(self.kept_chars);
        if room == 0 || self.kept_lines > self.limits.max_lines {
            self.dropped = true;
            return;
        }
        if chars <= room {
            self.kept.push_str(text);
            self.kept_chars += chars;
            self.kept_lines += lines;
        } else {
            let cut = text.char_indices().nth(room).map_or(text.len(), |(i, _)| i);
            self.kept.push_str(&text[..cut]);
            self.kept_chars += room;
            self.kept_lines += text[..cut].matches('\n').count();
            self.dropped = true;
        }
    }

    /// Bytes currently held.
    #[cfg(test)]
    pub(crate) fn held(&self) -> usize {
        self.kept.len()
    }

    /// Truncated view of everything pushed since the last call, or `None`
    /// when nothing but whitespace was printed. Leaves the buffer empty.
    pub fn finish(&mut self) -> Option<TruncationResult> {
        let limits = self.limits;
        let taken = std::mem::replace(self, Self::new(limits));
        let content = taken.kept.trim_end();
        if !taken.dropped {
            if content.is_empty() {
                return None;
            }
            return Some(truncate_output(content, limits));
        }
        Some(truncate_counted(content, limits, taken.total_chars, taken.total_lines))
    }
}
