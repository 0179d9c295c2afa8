use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::WikiConfig;
use crate::index::{ListQuery, NoteIndex};
use crate::markdown;
use crate::model::Document;

#[derive(Debug, Default)]
pub struct BuildReport {
    pub pages: usize,
    /// Documents with no page: write failures and slugs already taken.
    pub skipped: usize,
    /// Pages left over from documents that no longer exist.
    pub removed: usize,
}

/// Write the static site into `out_dir`:
/// one page per document under the link prefix, an index listing, and the
/// folder tree as JSON. When several documents share a slug the first by id
/// gets the page. Pages no document maps to any more are deleted.
pub async fn build_site(
    index: &NoteIndex,
    config: &WikiConfig,
    out_dir: &Path,
) -> Result<BuildReport> {
    fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut report = BuildReport::default();
    let mut written: HashSet<PathBuf> = HashSet::new();
    for doc in index.documents() {
        let page = page_path(out_dir, &config.render.link_prefix, &doc.slug());
        if written.contains(&page) {
            warn!(
                "skipping page for {}: slug {} is already taken",
                doc.id,
                doc.slug()
            );
            report.skipped += 1;
            continue;
        }
        let html = render_page(&doc, config);
        match write_file(&page, &html).await {
            Ok(()) => {
                report.pages += 1;
                written.insert(page);
            }
            Err(e) => {
                warn!("skipping page for {}: {e:#}", doc.id);
                report.skipped += 1;
            }
        }
    }
    report.removed =
        prune_stale_pages(&pages_dir(out_dir, &config.render.link_prefix), &written).await?;

    let listing = render_listing(&index.list(&ListQuery::default()), config);
    write_file(&out_dir.join("index.html"), &listing).await?;

    let mut tree = index.folder_tree();
    tree.sort_children();
    let json = serde_json::to_string_pretty(&tree)?;
    write_file(&out_dir.join("tree.json"), &json).await?;

    info!(
        "site built in {}: {} pages, {} skipped, {} removed",
        out_dir.display(),
        report.pages,
        report.skipped,
        report.removed
    );
    Ok(report)
}

/// `<out>/<prefix>/<slug>/index.html`; slashes in the prefix become
/// directories, and path-unsafe slug characters are replaced.
pub fn page_path(out_dir: &Path, link_prefix: &str, slug: &str) -> PathBuf {
    let mut path = pages_dir(out_dir, link_prefix);
    let safe: String = slug
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '-',
            _ => c,
        })
        .collect();
    let safe = match safe.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => safe,
    };
    path.push(safe);
    path.push("index.html");
    path
}

fn pages_dir(out_dir: &Path, link_prefix: &str) -> PathBuf {
    let mut path = out_dir.to_path_buf();
    for part in link_prefix.split('/').filter(|p| !p.is_empty() && *p != "..") {
        path.push(part);
    }
    path
}

/// Delete every `<pages_dir>/<name>/index.html` not in `keep`, and the
/// directory too once it is empty.
async fn prune_stale_pages(pages_dir: &Path, keep: &HashSet<PathBuf>) -> Result<usize> {
    let mut entries = match fs::read_dir(pages_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(e).with_context(|| format!("reading {}", pages_dir.display()));
        }
    };
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let page = entry.path().join("index.html");
        if keep.contains(&page) || fs::metadata(&page).await.is_err() {
            continue;
        }
        fs::remove_file(&page)
            .await
            .with_context(|| format!("removing {}", page.display()))?;
        fs::remove_dir(entry.path()).await.ok();
        debug!("removed stale page {}", page.display());
        removed += 1;
    }
    Ok(removed)
}

fn render_page(doc: &Document, config: &WikiConfig) -> String {
    let body = markdown::render_markdown(&doc.body, &config.render);
    let tags = if doc.tags.is_empty() {
        String::new()
    } else {
        let items: Vec<String> = doc.tags.iter().map(|t| escape_html(t)).collect();
        format!("<p class=\"tags\">{}</p>\n", items.join(", "))
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<article>\n{tags}{body}</article>\n</body>\n</html>\n",
        title = escape_html(&doc.title),
    )
}

fn render_listing(docs: &[Document], config: &WikiConfig) -> String {
    let mut items = String::new();
    for doc in docs {
        let href = format!("{}{}", config.render.link_prefix, doc.slug());
        let pin = if doc.pinned() { " class=\"pinned\"" } else { "" };
        let date = doc
            .date()
            .map(|d| format!(" <time>{d}</time>"))
            .unwrap_or_default();
        items.push_str(&format!(
            "<li{pin}><a href=\"{}\">{}</a>{date}</li>\n",
            escape_html(&href),
            escape_html(&doc.title)
        ));
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Index</title>\n</head>\n<body>\n<ul>\n{items}</ul>\n</body>\n</html>\n"
    )
}

async fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, content)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_page_path() {
        let out = Path::new("/out");
        assert_eq!(
            page_path(out, "/posts/", "foo-bar"),
            Path::new("/out/posts/foo-bar/index.html")
        );
        assert_eq!(page_path(out, "/", "a/b"), Path::new("/out/a-b/index.html"));
        assert_eq!(page_path(out, "/../x/", ".."), Path::new("/out/x/_/index.html"));
    }

    #[tokio::test]
    async fn test_build_site() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("py")).unwrap();
        std::fs::write(
            dir.path().join("py/intro.md"),
            "---\ntitle: Intro & More\npinned: true\n---\n# Start\n\nSee [[Advanced Python]]",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("py/adv.md"),
            "# Advanced Python\n\n```python\nx < 1\n```",
        )
        .unwrap();

        let config = Arc::new(WikiConfig::load(dir.path().to_path_buf()).unwrap());
        let index = NoteIndex::new(Arc::clone(&config));
        index.rebuild_full().await.unwrap();

        let report = build_site(&index, &config, &config.out_dir).await.unwrap();
        assert_eq!(report.pages, 2);
        assert_eq!(report.skipped, 0);

        let read = |rel: &str| std::fs::read_to_string(config.out_dir.join(rel)).unwrap();

        let intro = read("posts/intro-&-more/index.html");
        assert!(intro.contains("<title>Intro &amp; More</title>"));
        assert!(intro.contains("<a href=\"/posts/advanced-python\">Advanced Python</a>"));
        assert!(intro.contains("id=\"section-start\""));

        let adv = read("posts/advanced-python/index.html");
        assert!(adv.contains("x &lt; 1"));

        let listing = read("index.html");
        let pinned_at = listing.find("Intro &amp; More").unwrap();
        let adv_at = listing.find("Advanced Python").unwrap();
        assert!(pinned_at < adv_at);

        let tree: serde_json::Value = serde_json::from_str(&read("tree.json")).unwrap();
        assert_eq!(tree["path"], "/");
        assert_eq!(tree["children"][0]["name"], "py");
        assert_eq!(tree["children"][0]["children"].as_array().unwrap().len(), 2);

        // rebuilding does not pick up the generated output
        assert_eq!(index.rebuild_full().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_build_site_slug_collision_and_stale_pages() {
        let dir = tempfile::tempdir().unwrap();
        for (rel, text) in [
            ("js/intro.md", "# Intro\n\njs version"),
            ("py/intro.md", "# Intro\n\npy version"),
            ("py/gone.md", "# Gone\n"),
        ] {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, text).unwrap();
        }

        let config = Arc::new(WikiConfig::load(dir.path().to_path_buf()).unwrap());
        let index = NoteIndex::new(Arc::clone(&config));
        index.rebuild_full().await.unwrap();

        let report = build_site(&index, &config, &config.out_dir).await.unwrap();
        assert_eq!((report.pages, report.skipped, report.removed), (2, 1, 0));
        let intro_page = config.out_dir.join("posts/intro/index.html");
        let intro = std::fs::read_to_string(&intro_page).unwrap();
        assert!(intro.contains("js version"));
        assert!(!intro.contains("py version"));

        let gone = dir.path().join("py/gone.md");
        std::fs::remove_file(&gone).unwrap();
        index.remove_by_path(&gone);
        let report = build_site(&index, &config, &config.out_dir).await.unwrap();
        assert_eq!((report.pages, report.skipped, report.removed), (1, 1, 1));
        assert!(!config.out_dir.join("posts/gone").exists());
        assert!(intro_page.exists());
    }
}
