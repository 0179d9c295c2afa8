use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use tokio::fs;
use tracing::{debug, warn};

use crate::config::WikiConfig;
use crate::folder_tree;
use crate::model::{Document, FolderNode};
use crate::parser;
use crate::slug;
use crate::wikilink;

#[derive(Debug, Clone, PartialEq)]
pub struct BacklinkLocation {
    /// Id of the document containing the link.
    pub source: String,
    pub line: u32,
}

/// Filters for `NoteIndex::list` and `NoteIndex::search`.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub tag: Option<String>,
    pub category: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// A distinct `category` value across the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub slug: String,
    pub count: usize,
}

impl ListQuery {
    /// The category filter accepts either the category name or its slug.
    fn matches(&self, doc: &Document) -> bool {
        if let Some(tag) = &self.tag {
            if !doc.tags.contains(tag) {
                return false;
            }
        }
        if let Some(wanted) = &self.category {
            match doc.category() {
                Some(c) if c == wanted || slug::post_slug(c) == *wanted => {}
                _ => return false,
            }
        }
        true
    }

    fn page(&self, docs: Vec<Document>) -> Vec<Document> {
        let limit = self.limit.unwrap_or(docs.len());
        docs.into_iter().skip(self.offset).take(limit).collect()
    }
}

pub struct NoteIndex {
    pub documents: Arc<DashMap<String, Document>>,
    /// slug -> locations linking to it
    pub backlinks: Arc<DashMap<String, Vec<BacklinkLocation>>>,
    pub config: Arc<WikiConfig>,
}

impl NoteIndex {
    pub fn new(config: Arc<WikiConfig>) -> Self {
        NoteIndex {
            documents: Arc::new(DashMap::new()),
            backlinks: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Rebuild the full index by scanning every `.md` file under the root.
    /// Unreadable files are logged and skipped.
    pub async fn rebuild_full(&self) -> Result<usize> {
        self.documents.clear();
        self.backlinks.clear();

        let paths = self.collect_markdown_files().await?;
        for path in &paths {
            if let Err(e) = self.index_file(path).await {
                warn!("skipping {}: {e:#}", path.display());
            }
        }

        Ok(self.documents.len())
    }

    /// Update a single file in the index.
    pub async fn update_file(&self, path: &Path) -> Result<()> {
        if let Some(id) = self.doc_id(path) {
            self.remove_backlinks_from(&id);
        }
        self.index_file(path).await
    }

    /// Remove a document from the index by its path.
    pub fn remove_by_path(&self, path: &Path) {
        if let Some(id) = self.doc_id(path) {
            self.documents.remove(&id);
            self.remove_backlinks_from(&id);
        }
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.documents.get(id).map(|r| r.clone())
    }

    /// Snapshot of all documents, ordered by id.
    pub fn documents(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self.documents.iter().map(|e| e.value().clone()).collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        docs
    }

    /// Folder hierarchy of the current collection, rebuilt on every call.
    pub fn folder_tree(&self) -> FolderNode {
        folder_tree::build_folder_tree(self.documents())
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<Document> {
        self.documents().into_iter().find(|d| d.slug() == slug)
    }

    /// Case-insensitive substring search over title, body and excerpt.
    pub fn search(&self, query: &str, filter: &ListQuery) -> Vec<Document> {
        let q = query.to_lowercase();
        let hit = |d: &Document| {
            d.title.to_lowercase().contains(&q)
                || d.body.to_lowercase().contains(&q)
                || d.excerpt().is_some_and(|e| e.to_lowercase().contains(&q))
        };
        let mut hits: Vec<Document> = self
            .documents()
            .into_iter()
            .filter(|d| filter.matches(d))
            .filter(hit)
            .collect();
        sort_for_listing(&mut hits);
        filter.page(hits)
    }

    /// Pinned documents first, then newest date first.
    pub fn list(&self, filter: &ListQuery) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .documents()
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect();
        sort_for_listing(&mut docs);
        filter.page(docs)
    }

    /// Every category in use with its document count, ordered by name.
    pub fn categories(&self) -> Vec<Category> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for entry in self.documents.iter() {
            if let Some(name) = entry.value().category() {
                *counts.entry(name.to_string()).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .map(|(name, count)| Category {
                slug: slug::post_slug(&name),
                name,
                count,
            })
            .collect()
    }

    pub fn category_by_slug(&self, slug: &str) -> Option<Category> {
        self.categories().into_iter().find(|c| c.slug == slug)
    }

    /// Get all backlink locations for a slug.
    pub fn get_backlinks(&self, slug: &str) -> Vec<BacklinkLocation> {
        self.backlinks
            .get(slug)
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Relative, `/`-separated id for a path under the root.
    fn doc_id(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.config.root).ok()?;
        let parts: Vec<&str> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }

    async fn collect_markdown_files(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut pending = vec![self.config.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .with_context(|| format!("reading directory {}", dir.display()))?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with('.'))
                    .unwrap_or(true);
                if hidden || self.config.is_output(&path) {
                    continue;
                }
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if is_markdown_file(&path) {
                    paths.push(path);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    async fn index_file(&self, path: &Path) -> Result<()> {
        let id = self
            .doc_id(path)
            .with_context(|| format!("{} is outside the wiki root", path.display()))?;
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let doc = parser::parse_document(&id, &content);

        // the body is a suffix of the file; lines above it belong to front matter
        let body_line = content[..content.len() - doc.body.len()].matches('\n').count();
        for link in wikilink::wiki_links(&doc.body) {
            let line = (body_line + doc.body[..link.range.start].matches('\n').count()) as u32;
            self.backlinks
                .entry(link.slug())
                .or_default()
                .push(BacklinkLocation {
                    source: id.clone(),
                    line,
                });
        }

        debug!("indexed {id} as {}", doc.path);
        self.documents.insert(id, doc);
        Ok(())
    }

    fn remove_backlinks_from(&self, id: &str) {
        for mut entry in self.backlinks.iter_mut() {
            entry.value_mut().retain(|loc| loc.source != id);
        }
        // Remove empty entries
        self.backlinks.retain(|_, v| !v.is_empty());
    }
}

pub fn is_markdown_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("md")
}

fn sort_for_listing(docs: &mut [Document]) {
    docs.sort_by_key(|d| (Reverse(d.pinned()), Reverse(d.date()), d.title.to_lowercase()));
}
