use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::ValueEnum;
use tokio::fs;

use crate::config::WikiConfig;
use crate::parser;
use crate::slug;

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum Template {
    Gratitude,
    Recall,
}

impl Template {
    pub fn body(self) -> &'static str {
        match self {
            Template::Gratitude => "# Daily Gratitude\n\n1. \n2. \n3. \n",
            Template::Recall => {
                "# Daily Recall\n\n## Key Insights\n\n## Action Items\n\n## Questions\n"
            }
        }
    }
}

/// Create a new document named after the post slug of `title`.
/// An existing file is left as is. Returns the path to the file.
pub async fn create_note(
    config: &WikiConfig,
    title: &str,
    folder: Option<&str>,
    template: Option<Template>,
) -> Result<PathBuf> {
    let slug = slug::post_slug(title);
    if slug.is_empty() {
        bail!("title {title:?} produces an empty slug");
    }

    let mut dir = config.root.clone();
    if let Some(folder) = folder {
        for part in folder.split('/').filter(|p| !p.is_empty()) {
            if part == ".." || part == "." {
                bail!("folder {folder:?} must not contain relative segments");
            }
            dir.push(part);
        }
    }
    fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;

    let path = dir.join(format!("{slug}.md"));
    if !path.exists() {
        let date = Local::now().format("%Y-%m-%d");
        let body = match template {
            Some(t) => t.body().to_string(),
            None => format!("# {title}\n\n"),
        };
        let content = format!(
            "---\ntitle: {}\nslug: {slug}\ndate: {date}\ntags: []\npinned: false\n---\n{body}",
            yaml_string(title)
        );
        fs::write(&path, &content)
            .await
            .with_context(|| format!("writing note {}", path.display()))?;
    }
    Ok(path)
}

/// Flip the `pinned` flag in a document's front matter. Returns the new state.
pub async fn toggle_pin(path: &Path) -> Result<bool> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let pinned = parser::parse_front_matter(&content)
        .and_then(|fm| fm.fields.get("pinned").and_then(|v| v.as_bool()))
        .unwrap_or(false);
    let updated = parser::set_front_matter_field(&content, "pinned", &(!pinned).to_string());
    fs::write(path, updated)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(!pinned)
}

fn yaml_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}
