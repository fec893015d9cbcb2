// src/cli/trace.rs — JSONL event trace
//
// One JSON object per line, `ts` first, then the event's own fields.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::core::types::RlmEvent;

/// Open `path` for appending and return a sink that writes every event to it.
/// Write errors are logged and otherwise ignored.
pub fn jsonl_trace(path: &Path) -> anyhow::Result<impl Fn(RlmEvent) + Send + Sync + 'static> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let file = Mutex::new(file);

    Ok(move |event: RlmEvent| {
        let line = match trace_line(&event, chrono::Utc::now()) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to serialize trace event: {}", e);
                return;
            }
        };
        let Ok(mut f) = file.lock() else { return };
        if let Err(e) = write_line(&mut f, &line) {
            tracing::warn!("Failed to write trace event: {}", e);
        }
    })
}

fn trace_line(event: &RlmEvent, ts: chrono::DateTime<chrono::Utc>) -> serde_json::Result<String> {
    let mut record = Map::new();
    record.insert("ts".into(), Value::String(ts.to_rfc3339()));
    if let Value::Object(fields) = serde_json::to_value(event)? {
        record.extend(fields);
    }
    serde_json::to_string(&record)
}

fn write_line(f: &mut File, line: &str) -> std::io::Result<()> {
    writeln!(f, "{}", line)?;
    f.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trace_line_puts_timestamp_first() {
        let ts = chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let line = trace_line(
            &RlmEvent::BudgetExhausted {
                call_id: "abc".into(),
                turns: 4,
            },
            ts,
        )
        .unwrap();
        assert_eq!(
            line,
            r#"{"ts":"2026-01-02T03:04:05+00:00","event":"budget_exhausted","call_id":"abc","turns":4}"#
        );
    }

    #[test]
    fn test_jsonl_trace_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traces").join("run.jsonl");
        let sink = jsonl_trace(&path).unwrap();
        sink(RlmEvent::TurnStart {
            call_id: "c".into(),
            turn: 0,
            max_turns: 2,
        });
        sink(RlmEvent::BudgetExhausted {
            call_id: "c".into(),
            turns: 2,
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "turn_start");
        assert_eq!(lines[1]["event"], "budget_exhausted");
        assert!(lines[0]["ts"].as_str().is_some());
    }
}
