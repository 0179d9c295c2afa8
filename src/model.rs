use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::slug;

/// A single markdown document loaded from the wiki root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Path of the source file relative to the wiki root, `/`-separated.
    pub id: String,
    pub title: String,
    pub body: String,
    /// Slash-delimited logical path, e.g. `/py/intro`.
    pub path: String,
    pub tags: BTreeSet<String>,
    pub metadata: BTreeMap<String, Value>,
}

impl Document {
    /// Canonical slug: explicit `slug` metadata, else the wiki-link slug of the title.
    pub fn slug(&self) -> String {
        self.metadata
            .get("slug")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| slug::link_slug(&self.title))
    }

    pub fn pinned(&self) -> bool {
        self.metadata
            .get("pinned")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        let raw = self.metadata.get("date")?.as_str()?;
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
    }

    pub fn category(&self) -> Option<&str> {
        self.metadata
            .get("category")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn excerpt(&self) -> Option<&str> {
        self.metadata.get("excerpt").and_then(Value::as_str)
    }
}

/// One path segment in the folder hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderNode {
    pub name: String,
    /// Accumulated path including this segment, always ending in `/`.
    pub path: String,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Folder(FolderNode),
    Document(Document),
}

#[cfg(test)]
pub(crate) fn doc(id: &str, title: &str, path: &str) -> Document {
    Document {
        id: id.to_string(),
        title: title.to_string(),
        body: String::new(),
        path: path.to_string(),
        tags: BTreeSet::new(),
        metadata: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slug_falls_back_to_title() {
        let d = doc("a.md", "Beta Two", "/a");
        assert_eq!(d.slug(), "beta-two");
    }

    #[test]
    fn test_slug_from_metadata() {
        let mut d = doc("a.md", "Beta Two", "/a");
        d.metadata.insert("slug".into(), json!("custom"));
        assert_eq!(d.slug(), "custom");
    }

    #[test]
    fn test_derived_fields() {
        let mut d = doc("a.md", "A", "/a");
        assert!(!d.pinned());
        assert_eq!(d.date(), None);
        d.metadata.insert("pinned".into(), json!(true));
        d.metadata.insert("date".into(), json!("2024-03-05"));
        d.metadata.insert("category".into(), json!("python-basics"));
        assert!(d.pinned());
        assert_eq!(d.date(), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(d.category(), Some("python-basics"));
    }

    #[test]
    fn test_tree_node_serializes_with_type_tag() {
        let node = TreeNode::Folder(FolderNode {
            name: "py".into(),
            path: "/py/".into(),
            children: vec![TreeNode::Document(doc("py/intro.md", "Intro", "/py/intro"))],
        });
        let v = serde_json::to_value(&node).unwrap();
        assert_eq!(v["type"], "folder");
        assert_eq!(v["path"], "/py/");
        assert_eq!(v["children"][0]["type"], "document");
        assert_eq!(v["children"][0]["title"], "Intro");
    }
}
