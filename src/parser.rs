/// Stateless parsing of markdown documents: YAML front matter, title and path.
use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::model::Document;

static RE_H1: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    pub fields: BTreeMap<String, Value>,
    /// Byte offset where the body starts (just past the closing `---` line).
    pub body_start: usize,
}

/// Split off a leading `---` ... `---` YAML block.
/// Returns None if there is no block or it is not a YAML mapping.
pub fn parse_front_matter(content: &str) -> Option<FrontMatter> {
    let (fm_start, fm_end, body_start) = front_matter_bounds(content)?;
    let raw = &content[fm_start..fm_end];
    if raw.trim().is_empty() {
        return Some(FrontMatter {
            fields: BTreeMap::new(),
            body_start,
        });
    }
    let yaml: serde_yaml::Value = match serde_yaml::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            debug!("front matter is not valid YAML: {e}");
            return None;
        }
    };
    match serde_json::to_value(yaml).ok()? {
        Value::Object(map) => Some(FrontMatter {
            fields: map.into_iter().collect(),
            body_start,
        }),
        _ => None,
    }
}

/// Byte offsets of (yaml start, yaml end, body start), or None when the text
/// does not open with a `---` line that is later closed.
fn front_matter_bounds(content: &str) -> Option<(usize, usize, usize)> {
    let bom = if content.starts_with('\u{feff}') {
        '\u{feff}'.len_utf8()
    } else {
        0
    };
    let mut lines = content[bom..].split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }
    let fm_start = bom + first.len();
    let mut offset = fm_start;
    for line in lines {
        let line_start = offset;
        offset += line.len();
        let t = line.trim_end();
        if t == "---" || t == "..." {
            return Some((fm_start, line_start, offset));
        }
    }
    None
}

/// Build a Document from a file's text. `rel_path` is the file path relative
/// to the wiki root, `/`-separated.
///
/// - title: `title` field, else the first `# ` heading, else the file stem
/// - path: `path` field, else `rel_path` without extension, with a leading `/`
/// - tags: `tags` as a list or a comma-separated string
pub fn parse_document(rel_path: &str, content: &str) -> Document {
    let (metadata, body) = match parse_front_matter(content) {
        Some(fm) => (fm.fields, &content[fm.body_start..]),
        None => (BTreeMap::new(), content),
    };

    let title = metadata
        .get("title")
        .and_then(value_as_string)
        .or_else(|| first_heading(body))
        .unwrap_or_else(|| file_stem(rel_path).to_string());

    let path = metadata
        .get("path")
        .and_then(Value::as_str)
        .map(|p| {
            let p = p.trim();
            if p.starts_with('/') {
                p.to_string()
            } else {
                format!("/{p}")
            }
        })
        .unwrap_or_else(|| default_path(rel_path));

    let tags = metadata.get("tags").map(parse_tags).unwrap_or_default();

    Document {
        id: rel_path.to_string(),
        title,
        body: body.to_string(),
        path,
        tags,
        metadata,
    }
}

pub fn first_heading(body: &str) -> Option<String> {
    let mut in_code_block = false;
    for line in body.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }
        if let Some(cap) = RE_H1.captures(line) {
            return cap.get(1).map(|m| m.as_str().to_string());
        }
    }
    None
}

fn parse_tags(value: &Value) -> BTreeSet<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(value_as_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => BTreeSet::new(),
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn file_stem(rel_path: &str) -> &str {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    name.strip_suffix(".md").unwrap_or(name)
}

fn default_path(rel_path: &str) -> String {
    let without_ext = rel_path.strip_suffix(".md").unwrap_or(rel_path);
    format!("/{}", without_ext.trim_start_matches('/'))
}

/// Set `key: value` inside the front matter, adding the line (or the whole
/// block) when missing. Other lines are left untouched.
pub fn set_front_matter_field(content: &str, key: &str, value: &str) -> String {
    let new_line = format!("{key}: {value}");
    let Some((fm_start, fm_end, _)) = front_matter_bounds(content) else {
        return format!("---\n{new_line}\n---\n{content}");
    };

    let prefix = format!("{key}:");
    let mut lines: Vec<String> = content[fm_start..fm_end]
        .lines()
        .map(str::to_string)
        .collect();
    match lines.iter().position(|l| l.starts_with(&prefix)) {
        Some(i) => lines[i] = new_line,
        None => lines.push(new_line),
    }

    let mut out = String::with_capacity(content.len() + key.len() + value.len() + 4);
    out.push_str(&content[..fm_start]);
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&content[fm_end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOTE_WITH_META: &str = r#"---
title: Python Intro
tags: [python, basics]
date: 2024-01-15
pinned: true
category: python-basics
---
# Ignored Heading

Body text with [[Advanced Python]].
"#;

    const NOTE_NO_META: &str = "Some preamble\n\n# Simple Note #\n\nContent.\n";

    #[test]
    fn test_parse_document_with_meta() {
        let d = parse_document("py/intro.md", NOTE_WITH_META);
        assert_eq!(d.id, "py/intro.md");
        assert_eq!(d.title, "Python Intro");
        assert_eq!(d.path, "/py/intro");
        assert_eq!(
            d.tags.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["basics", "python"]
        );
        assert!(d.pinned());
        assert_eq!(d.category(), Some("python-basics"));
        assert_eq!(d.metadata["date"], json!("2024-01-15"));
        assert!(d.body.starts_with("# Ignored Heading"));
    }

    #[test]
    fn test_parse_document_no_meta() {
        let d = parse_document("simple.md", NOTE_NO_META);
        assert_eq!(d.title, "Simple Note");
        assert_eq!(first_heading("# C#\n").as_deref(), Some("C#"));
        assert_eq!(d.path, "/simple");
        assert!(d.tags.is_empty());
        assert!(d.metadata.is_empty());
        assert_eq!(d.body, NOTE_NO_META);
    }

    #[test]
    fn test_title_falls_back_to_stem() {
        let d = parse_document("a/b/untitled-note.md", "just text\n```\n# not a title\n```\n");
        assert_eq!(d.title, "untitled-note");
        assert_eq!(d.path, "/a/b/untitled-note");
    }

    #[test]
    fn test_explicit_path_and_string_tags() {
        let d = parse_document(
            "x.md",
            "---\npath: js/intro\ntags: \"js, web , \"\n---\nbody",
        );
        assert_eq!(d.path, "/js/intro");
        assert_eq!(d.tags.len(), 2);
        assert!(d.tags.contains("web"));
        assert_eq!(d.body, "body");
    }

    #[test]
    fn test_invalid_yaml_treated_as_body() {
        let text = "---\ntitle: [unclosed\n---\n# Real\n";
        let d = parse_document("r.md", text);
        assert!(d.metadata.is_empty());
        assert_eq!(d.title, "Real");
        assert_eq!(d.body, text);
    }

    #[test]
    fn test_unclosed_front_matter_is_body() {
        assert!(parse_front_matter("---\ntitle: x\n").is_none());
    }

    #[test]
    fn test_front_matter_with_bom_and_empty_block() {
        let fm = parse_front_matter("\u{feff}---\ntitle: x\n---\nrest").unwrap();
        assert_eq!(fm.fields["title"], json!("x"));
        let empty = parse_front_matter("---\n---\nrest").unwrap();
        assert!(empty.fields.is_empty());
        assert_eq!(&"---\n---\nrest"[empty.body_start..], "rest");
    }

    #[test]
    fn test_set_front_matter_field() {
        let updated = set_front_matter_field(NOTE_WITH_META, "pinned", "false");
        assert!(updated.contains("\npinned: false\n"));
        assert!(!updated.contains("pinned: true"));
        assert!(updated.ends_with("Body text with [[Advanced Python]].\n"));

        let added = set_front_matter_field("---\ntitle: A\n---\nbody", "pinned", "true");
        assert_eq!(added, "---\ntitle: A\npinned: true\n---\nbody");

        let created = set_front_matter_field("body", "pinned", "true");
        assert_eq!(created, "---\npinned: true\n---\nbody");
    }
}
