// src/core/parser.rs — Code fences and final-answer markers in model replies

/// Fence tag that marks an executable fragment.
pub const REPL_TAG: &str = "repl";

/// A final-answer marker found in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalMarker {
    /// `FINAL(answer)`
    Literal(String),
    /// `FINAL_VAR(name)`
    Variable(String),
}

/// Bodies of every closed ```` ```<tag> ```` fence, in order.
///
/// Fences with other tags are skipped. An unterminated fence is dropped.
pub fn extract_code_blocks(text: &str, tag: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut open: Option<(bool, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        match open.take() {
            None => {
                if let Some(info) = trimmed.strip_prefix("```") {
                    let wanted = info.trim().eq_ignore_ascii_case(tag);
                    open = Some((wanted, Vec::new()));
                }
            }
            Some((wanted, mut body)) => {
                if trimmed == "```" {
                    if wanted {
                        blocks.push(body.join("\n"));
                    }
                } else {
                    body.push(line);
                    open = Some((wanted, body));
                }
            }
        }
    }

    blocks
}

/// First `FINAL(...)` or `FINAL_VAR(...)` that starts a line outside any
/// code fence. Markers with an empty body are ignored.
pub fn find_final_answer(text: &str) -> Option<FinalMarker> {
    let mut in_fence = false;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        let indent = line.len() - trimmed.len();
        let (is_var, prefix) = if trimmed.starts_with("FINAL_VAR(") {
            (true, "FINAL_VAR(")
        } else if trimmed.starts_with("FINAL(") {
            (false, "FINAL(")
        } else {
            continue;
        };

        let body_start = line_start + indent + prefix.len();
        let body = balanced_body(&text[body_start..]).trim();

        if is_var {
            let name = strip_quotes(body);
            if !name.is_empty() {
                return Some(FinalMarker::Variable(name.to_string()));
            }
        } else if !body.is_empty() {
            return Some(FinalMarker::Literal(body.to_string()));
        }
    }

    None
}

/// Strip a `FINAL(...)` wrapper if the reply carries one; otherwise the reply
/// as-is.
pub fn unwrap_final(text: &str) -> String {
    match find_final_answer(text) {
        Some(FinalMarker::Literal(answer)) => answer,
        _ => text.trim().to_string(),
    }
}

/// Text up to the parenthesis that closes an already-open one. Without a
/// match, everything up to the last `)` (or the end).
fn balanced_body(rest: &str) -> &str {
    let mut depth = 0usize;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return &rest[..i],
            ')' => depth -= 1,
            _ => {}
        }
    }
    match rest.rfind(')') {
        Some(i) => &rest[..i],
        None => rest,
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\'', '`'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── Code blocks ────────────────────────────────────────────

    #[test]
    fn test_extracts_repl_blocks_in_order() {
        let text = "Let me look.\n```repl\nprint(1);\n```\nthen\n```repl\nlet x = 2;\nprint(x);\n```\n";
        assert_eq!(
            extract_code_blocks(text, REPL_TAG),
            vec!["print(1);".to_string(), "let x = 2;\nprint(x);".to_string()]
        );
    }

    #[test]
    fn test_other_fences_ignored() {
        let text = "```python\nprint(1)\n```\n```\nplain\n```\n```repl\nok\n```";
        assert_eq!(extract_code_blocks(text, REPL_TAG), vec!["ok".to_string()]);
    }

    #[test]
    fn test_unterminated_fence_dropped() {
        assert!(extract_code_blocks("```repl\nprint(1);\n", REPL_TAG).is_empty());
    }

    #[test]
    fn test_no_blocks_in_plain_text() {
        assert!(extract_code_blocks("Just thinking out loud.", REPL_TAG).is_empty());
    }

    // ─── Final markers ──────────────────────────────────────────

    #[test]
    fn test_literal_marker() {
        assert_eq!(
            find_final_answer("Done.\nFINAL(Paris, in Europe)"),
            Some(FinalMarker::Literal("Paris, in Europe".into()))
        );
    }

    #[test]
    fn test_variable_marker_with_quotes() {
        assert_eq!(
            find_final_answer("FINAL_VAR(\"answer\")"),
            Some(FinalMarker::Variable("answer".into()))
        );
        assert_eq!(
            find_final_answer("  FINAL_VAR(answer)"),
            Some(FinalMarker::Variable("answer".into()))
        );
    }

    #[test]
    fn test_nested_parens_and_multiline() {
        assert_eq!(
            find_final_answer("FINAL(f(x) = 2 (approx))"),
            Some(FinalMarker::Literal("f(x) = 2 (approx)".into()))
        );
        assert_eq!(
            find_final_answer("FINAL(line one\nline two)\ntrailing"),
            Some(FinalMarker::Literal("line one\nline two".into()))
        );
    }

    #[test]
    fn test_marker_must_start_line() {
        assert_eq!(find_final_answer("I will call FINAL(x) later"), None);
    }

    #[test]
    fn test_marker_inside_fence_ignored() {
        let text = "```repl\nFINAL(not yet)\n```\nstill working";
        assert_eq!(find_final_answer(text), None);
    }

    #[test]
    fn test_first_marker_wins() {
        let text = "FINAL_VAR(result)\nFINAL(other)";
        assert_eq!(find_final_answer(text), Some(FinalMarker::Variable("result".into())));
    }

    #[test]
    fn test_empty_marker_ignored() {
        assert_eq!(find_final_answer("FINAL()"), None);
        assert_eq!(
            find_final_answer("FINAL_VAR( )\nFINAL(real)"),
            Some(FinalMarker::Literal("real".into()))
        );
    }

    #[test]
    fn test_unbalanced_marker_takes_rest() {
        assert_eq!(
            find_final_answer("FINAL(open ended"),
            Some(FinalMarker::Literal("open ended".into()))
        );
    }

    #[test]
    fn test_unwrap_final() {
        assert_eq!(unwrap_final("Sure.\nFINAL(42)"), "42");
        assert_eq!(unwrap_final("  The answer is 42.  "), "The answer is 42.");
    }
}
