// src/core/slicer.rs — Context slicing
//
// Partitions a normalized context into addressable slices, first match wins:
//   mapping              → one slice per key            dict_<key>
//   sequence ≤ threshold → one slice per item           item_<i>
//   sequence > threshold → fixed-size item chunks       chunk_<n>
//   text with headings   → one slice per section        section_<slug>
//   other text           → fixed-size character chunks  chunk_<n>

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use serde_json::{Map, Value};

use super::types::{Context, ContextSlice, SliceSet};

#[derive(Debug, Clone)]
pub struct SlicerConfig {
    /// Sequences up to this length get one slice per item.
    pub item_threshold: usize,
    pub sequence_chunk_size: usize,
    pub text_chunk_chars: usize,
    /// Deepest heading level that starts a section.
    pub max_heading_level: u8,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            item_threshold: 10,
            sequence_chunk_size: 10,
            text_chunk_chars: 10_000,
            max_heading_level: 3,
        }
    }
}

impl From<&crate::infra::config::SlicingConfig> for SlicerConfig {
    fn from(cfg: &crate::infra::config::SlicingConfig) -> Self {
        Self {
            item_threshold: cfg.item_threshold,
            sequence_chunk_size: cfg.sequence_chunk_size,
            text_chunk_chars: cfg.text_chunk_chars,
            max_heading_level: cfg.max_heading_level,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextSlicer {
    config: SlicerConfig,
}

/// A heading that opens a section.
#[derive(Debug, Clone, PartialEq)]
struct Heading {
    start: usize,
    level: u8,
    text: String,
}

impl ContextSlicer {
    pub fn new(config: SlicerConfig) -> Self {
        Self { config }
    }

    pub fn slice(&self, context: &Context) -> SliceSet {
        let slices = match context {
            Context::Mapping(map) => self.slice_mapping(map),
            Context::Sequence(items) if items.len() <= self.config.item_threshold => {
                self.slice_items(items)
            }
            Context::Sequence(items) => self.slice_item_chunks(items),
            Context::Text(text) => {
                let headings = find_headings(text, self.config.max_heading_level);
                if headings.is_empty() {
                    self.slice_char_chunks(text)
                } else {
                    self.slice_sections(text, &headings)
                }
            }
        };

        tracing::debug!(
            kind = context.kind(),
            size = context.size(),
            slices = slices.len(),
            "Context sliced"
        );
        slices
    }

    fn slice_mapping(&self, map: &Map<String, Value>) -> SliceSet {
        let mut set = SliceSet::new();
        for (key, value) in map {
            set.insert(ContextSlice::new(
                format!("dict_{key}"),
                value.clone(),
                meta([("type", "dict_value".into()), ("key", key.as_str().into())]),
            ));
        }
        set
    }

    fn slice_items(&self, items: &[Value]) -> SliceSet {
        let mut set = SliceSet::new();
        for (i, item) in items.iter().enumerate() {
            set.insert(ContextSlice::new(
                format!("item_{i}"),
                item.clone(),
                meta([("type", "list_item".into()), ("index", i.into())]),
            ));
        }
        set
    }

    fn slice_item_chunks(&self, items: &[Value]) -> SliceSet {
        let size = self.config.sequence_chunk_size.max(1);
        let mut set = SliceSet::new();
        for (n, chunk) in items.chunks(size).enumerate() {
            let start = n * size;
            set.insert(ContextSlice::new(
                format!("chunk_{n}"),
                Value::Array(chunk.to_vec()),
                meta([
                    ("type", "list_chunk".into()),
                    ("start_index", start.into()),
                    ("end_index", (start + chunk.len()).into()),
                    ("size", chunk.len().into()),
                ]),
            ));
        }
        set
    }

    fn slice_char_chunks(&self, text: &str) -> SliceSet {
        let size = self.config.text_chunk_chars.max(1);
        let mut set = SliceSet::new();
        if text.is_empty() {
            return set;
        }

        // Byte offsets of every `size`-th char boundary.
        let mut bounds: Vec<usize> = text
            .char_indices()
            .step_by(size)
            .map(|(byte, _)| byte)
            .collect();
        bounds.push(text.len());

        for (n, pair) in bounds.windows(2).enumerate() {
            let chunk = &text[pair[0]..pair[1]];
            let start_char = n * size;
            let len = chunk.chars().count();
            set.insert(ContextSlice::new(
                format!("chunk_{n}"),
                Value::String(chunk.to_string()),
                meta([
                    ("type", "string_chunk".into()),
                    ("start_char", start_char.into()),
                    ("end_char", (start_char + len).into()),
                    ("size", len.into()),
                ]),
            ));
        }
        set
    }

    fn slice_sections(&self, text: &str, headings: &[Heading]) -> SliceSet {
        let mut set = SliceSet::new();

        let first = headings[0].start;
        if !text[..first].trim().is_empty() {
            set.insert(ContextSlice::new(
                "section_preamble",
                Value::String(text[..first].trim_end().to_string()),
                section_meta("", 0, 0, first),
            ));
        }

        for (i, heading) in headings.iter().enumerate() {
            let end = headings
                .get(i + 1)
                .map(|next| next.start)
                .unwrap_or(text.len());
            set.insert(ContextSlice::new(
                format!("section_{}", section_slug(&heading.text)),
                Value::String(text[heading.start..end].trim_end().to_string()),
                section_meta(&heading.text, heading.level, heading.start, end),
            ));
        }
        set
    }
}

/// Slice with the default thresholds.
pub fn slice(context: &Context) -> SliceSet {
    ContextSlicer::default().slice(context)
}

/// Markdown headings up to `max_level`, in document order. Headings inside
/// code blocks are not reported.
fn find_headings(text: &str, max_level: u8) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut current: Option<Heading> = None;

    for (event, range) in Parser::new(text).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                let level = heading_level(level);
                if level <= max_level {
                    current = Some(Heading {
                        start: line_start(text, range.start),
                        level,
                        text: String::new(),
                    });
                }
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some(h) = current.as_mut() {
                    h.text.push_str(&t);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(mut h) = current.take() {
                    h.text = h.text.trim().to_string();
                    headings.push(h);
                }
            }
            _ => {}
        }
    }
    headings
}

/// Start of the line holding `offset`. Headings nested in block quotes or
/// lists begin mid-line.
fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map_or(0, |i| i + 1)
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// `"Getting Started!"` → `"getting_started"`.
fn section_slug(heading: &str) -> String {
    let s = slug::slugify(heading).replace('-', "_");
    if s.is_empty() {
        "untitled".to_string()
    } else {
        s
    }
}

fn section_meta(header: &str, level: u8, start: usize, end: usize) -> Map<String, Value> {
    meta([
        ("type", "markdown_section".into()),
        ("header", header.into()),
        ("level", level.into()),
        ("start_byte", start.into()),
        ("end_byte", end.into()),
    ])
}

fn meta<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(set: &SliceSet) -> Vec<String> {
        set.ids()
    }

    // ─── Mapping & sequence ─────────────────────────────────────

    #[test]
    fn test_mapping_one_slice_per_key() {
        let ctx = Context::from_json(serde_json::json!({"a": "x", "b": [1, 2], "c": {"d": 1}}));
        let set = slice(&ctx);
        assert_eq!(ids(&set), vec!["dict_a", "dict_b", "dict_c"]);
        let b = set.get("dict_b").unwrap();
        assert_eq!(b.content, serde_json::json!([1, 2]));
        assert_eq!(b.metadata["type"], "dict_value");
        assert_eq!(b.metadata["key"], "b");
    }

    #[test]
    fn test_short_sequence_one_slice_per_item() {
        let ctx = Context::from_json(serde_json::json!(["a", "b", "c"]));
        let set = slice(&ctx);
        assert_eq!(ids(&set), vec!["item_0", "item_1", "item_2"]);
        assert_eq!(set.get("item_2").unwrap().metadata["index"], 2);
    }

    #[test]
    fn test_sequence_at_threshold_stays_itemized() {
        let items: Vec<Value> = (0..10).map(Value::from).collect();
        let set = slice(&Context::Sequence(items));
        assert_eq!(set.len(), 10);
        assert!(set.contains("item_9"));
    }

    #[test]
    fn test_long_sequence_chunks() {
        let items: Vec<Value> = (0..25).map(Value::from).collect();
        let set = slice(&Context::Sequence(items));
        assert_eq!(ids(&set), vec!["chunk_0", "chunk_1", "chunk_2"]);
        let ranges: Vec<(u64, u64)> = set
            .iter()
            .map(|s| {
                (
                    s.metadata["start_index"].as_u64().unwrap(),
                    s.metadata["end_index"].as_u64().unwrap(),
                )
            })
            .collect();
        assert_eq!(ranges, vec![(0, 10), (10, 20), (20, 25)]);
        assert_eq!(set.get("chunk_2").unwrap().content, serde_json::json!([20, 21, 22, 23, 24]));
        assert_eq!(set.get("chunk_2").unwrap().metadata["size"], 5);
    }

    #[test]
    fn test_custom_thresholds() {
        let slicer = ContextSlicer::new(SlicerConfig {
            item_threshold: 2,
            sequence_chunk_size: 2,
            ..Default::default()
        });
        let set = slicer.slice(&Context::from(vec!["a".to_string(), "b".into(), "c".into()]));
        assert_eq!(ids(&set), vec!["chunk_0", "chunk_1"]);
    }

    #[test]
    fn test_empty_contexts_yield_no_slices() {
        assert!(slice(&Context::from("")).is_empty());
        assert!(slice(&Context::Sequence(vec![])).is_empty());
        assert!(slice(&Context::Mapping(Map::new())).is_empty());
    }

    // ─── Text ───────────────────────────────────────────────────

    #[test]
    fn test_markdown_sections() {
        let text = "Intro line.\n\n# Overview\nAlpha.\n\n## Getting Started!\nBeta.\n\n#### Deep\nstill beta\n\n### Notes\nGamma.\n";
        let set = slice(&Context::from(text));
        assert_eq!(
            ids(&set),
            vec![
                "section_preamble",
                "section_overview",
                "section_getting_started",
                "section_notes"
            ]
        );
        let gs = set.get("section_getting_started").unwrap();
        assert_eq!(gs.metadata["level"], 2);
        assert_eq!(gs.metadata["header"], "Getting Started!");
        let body = gs.content.as_str().unwrap();
        assert!(body.starts_with("## Getting Started!"));
        assert!(body.contains("#### Deep"));
        assert!(!body.contains("Gamma"));
        assert_eq!(set.get("section_preamble").unwrap().metadata["level"], 0);
    }

    #[test]
    fn test_sections_cover_text_from_first_heading() {
        let text = "# A\none\n# B\ntwo";
        let set = slice(&Context::from(text));
        let a = set.get("section_a").unwrap();
        let b = set.get("section_b").unwrap();
        assert_eq!(a.metadata["start_byte"], 0);
        assert_eq!(a.metadata["end_byte"], b.metadata["start_byte"]);
        assert_eq!(b.metadata["end_byte"], text.len());
    }

    #[test]
    fn test_quoted_heading_keeps_whole_line() {
        let text = "> # Quoted\n> body\n\n# Real\ntext";
        let set = slice(&Context::from(text));
        assert_eq!(ids(&set), vec!["section_quoted", "section_real"]);
        assert_eq!(
            set.get("section_quoted").unwrap().content,
            Value::String("> # Quoted\n> body".into())
        );
        assert_eq!(set.get("section_quoted").unwrap().metadata["start_byte"], 0);
        assert_eq!(
            set.get("section_real").unwrap().content,
            Value::String("# Real\ntext".into())
        );
    }

    #[test]
    fn test_duplicate_headings_get_suffix() {
        let text = "# Results\na\n# Results\nb\n# Results\nc";
        let set = slice(&Context::from(text));
        assert_eq!(
            ids(&set),
            vec!["section_results", "section_results_2", "section_results_3"]
        );
    }

    #[test]
    fn test_heading_inside_code_block_ignored() {
        let text = "```\n# not a heading\n```\nplain text only";
        let set = slice(&Context::from(text));
        assert_eq!(ids(&set), vec!["chunk_0"]);
    }

    #[test]
    fn test_text_without_headings_chunks_by_chars() {
        let slicer = ContextSlicer::new(SlicerConfig {
            text_chunk_chars: 4,
            ..Default::default()
        });
        let set = slicer.slice(&Context::from("ééééabcdxy"));
        assert_eq!(ids(&set), vec!["chunk_0", "chunk_1", "chunk_2"]);
        assert_eq!(set.get("chunk_0").unwrap().content, "éééé");
        let last = set.get("chunk_2").unwrap();
        assert_eq!(last.content, "xy");
        assert_eq!(last.metadata["start_char"], 8);
        assert_eq!(last.metadata["end_char"], 10);
        assert_eq!(last.metadata["size"], 2);
    }

    #[test]
    fn test_default_chunk_size_is_ten_thousand_chars() {
        let text = "x".repeat(25_000);
        let set = slice(&Context::from(text));
        assert_eq!(set.len(), 3);
        assert_eq!(set.get("chunk_0").unwrap().metadata["size"], 10_000);
        assert_eq!(set.get("chunk_2").unwrap().metadata["size"], 5_000);
    }

    #[test]
    fn test_slug_fallback() {
        assert_eq!(section_slug("???"), "untitled");
        assert_eq!(section_slug("API Reference v2"), "api_reference_v2");
    }
}
