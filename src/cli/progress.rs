// src/cli/progress.rs — Terminal progress renderer for run events

use crate::core::types::RlmEvent;

/// Longest preview of model text shown on one progress line.
const PREVIEW_CHARS: usize = 80;

/// Build a progress callback that writes formatted output to stderr.
///
/// Stdout stays reserved for the answer.
pub fn terminal_progress() -> impl Fn(RlmEvent) + Send + Sync + 'static {
    move |event| {
        if let Some(line) = format_event(&event) {
            eprintln!("{}", line);
        }
    }
}

/// One progress line per event, or `None` for events not worth showing.
pub fn format_event(event: &RlmEvent) -> Option<String> {
    let line = match event {
        RlmEvent::CallStart {
            context_kind,
            context_size,
            slice_count,
            max_turns,
            ..
        } => format!(
            "[start] {} context, size {}, {} slice(s), up to {} turn(s)",
            context_kind, context_size, slice_count, max_turns
        ),
        RlmEvent::TurnStart { turn, max_turns, .. } => {
            format!("[turn {}/{}] asking root model...", turn + 1, max_turns)
        }
        RlmEvent::ModelResponse { .. } => return None,
        RlmEvent::CodeExecuted {
            turn,
            block,
            output,
            failed,
            truncated,
            ..
        } => {
            let status = if *failed { "error" } else { "ok" };
            let suffix = if *truncated { " (truncated)" } else { "" };
            format!(
                "[turn {}]   repl #{} {}{}: {}",
                turn + 1,
                block + 1,
                status,
                suffix,
                preview(output)
            )
        }
        RlmEvent::DelegateCall {
            slice_id,
            scoped,
            failed,
            elapsed_ms,
            ..
        } => {
            let target = match (slice_id, scoped) {
                (Some(id), true) => id.clone(),
                (Some(id), false) => format!("{} (unknown, unscoped)", id),
                (None, _) => "whole prompt".to_string(),
            };
            let status = if *failed { " FAILED" } else { "" };
            format!("[llm_query] {} {}ms{}", target, elapsed_ms, status)
        }
        RlmEvent::UnresolvedVariable { turn, name, .. } => {
            format!("[turn {}]   FINAL_VAR({}) unresolved, continuing", turn + 1, name)
        }
        RlmEvent::TurnEnd {
            turn,
            hypothesis,
            delegate_calls,
            ..
        } => match hypothesis {
            Some(h) => format!(
                "[turn {}] hypothesis: {} ({} sub-call(s) so far)",
                turn + 1,
                preview(h),
                delegate_calls
            ),
            None => format!("[turn {}] {} sub-call(s) so far", turn + 1, delegate_calls),
        },
        RlmEvent::BudgetExhausted { turns, .. } => {
            format!("[budget] {} turn(s) used, forcing a final answer", turns)
        }
        RlmEvent::FinalAnswer {
            termination,
            turns,
            root_calls,
            delegate_calls,
            elapsed_ms,
            ..
        } => format!(
            "[done] via {} turns={} root_calls={} sub_calls={} {:.1}s",
            termination,
            turns,
            root_calls,
            delegate_calls,
            *elapsed_ms as f64 / 1000.0
        ),
    };
    Some(line)
}

/// First line of `text`, cut to a short preview.
fn preview(text: &str) -> String {
    let first = text.lines().next().unwrap_or("");
    let mut out: String = first.chars().take(PREVIEW_CHARS).collect();
    if first.chars().count() > PREVIEW_CHARS || text.lines().nth(1).is_some() {
        out.push_str("...");
    }
    out
}
