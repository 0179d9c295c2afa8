use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "notewiki.toml";

/// Options for a single render call. Passed by value, never stored globally.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub link_prefix: String,
    pub heading_id_prefix: String,
    /// Pass raw HTML in documents through instead of omitting it.
    pub allow_raw_html: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            link_prefix: "/posts/".into(),
            heading_id_prefix: "section-".into(),
            allow_raw_html: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    render: RenderConfig,
    site: SiteSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SiteSection {
    out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct WikiConfig {
    pub root: PathBuf,
    pub out_dir: PathBuf,
    pub render: RenderConfig,
}

impl WikiConfig {
    /// Resolution order: CLI flag → WIKI_ROOT env → ~/wiki fallback.
    /// `notewiki.toml` in the resolved root is read if present.
    pub fn resolve(cli_root: Option<PathBuf>) -> Result<Self> {
        let root = cli_root
            .or_else(|| std::env::var("WIKI_ROOT").ok().map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join("wiki")
            });
        Self::load(root)
    }

    pub fn load(root: PathBuf) -> Result<Self> {
        let file = root.join(CONFIG_FILE);
        let parsed = if file.is_file() {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            toml::from_str::<FileConfig>(&text)
                .with_context(|| format!("parsing {}", file.display()))?
        } else {
            FileConfig::default()
        };
        Ok(Self::from_parts(root, parsed))
    }

    fn from_parts(root: PathBuf, file: FileConfig) -> Self {
        let out_dir = match file.site.out_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => root.join(dir),
            None => root.join("_site"),
        };
        WikiConfig {
            root,
            out_dir,
            render: file.render,
        }
    }

    /// True if `path` lies inside the generated site directory.
    pub fn is_output(&self, path: &Path) -> bool {
        path.starts_with(&self.out_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = WikiConfig::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.render, RenderConfig::default());
        assert_eq!(config.out_dir, dir.path().join("_site"));
        assert!(config.is_output(&dir.path().join("_site/posts/a/index.html")));
        assert!(!config.is_output(&dir.path().join("notes/a.md")));
    }

    #[test]
    fn test_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[render]\nlink_prefix = \"/wiki/\"\n\n[site]\nout_dir = \"public\"\n",
        )
        .unwrap();
        let config = WikiConfig::load(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.render.link_prefix, "/wiki/");
        assert_eq!(config.render.heading_id_prefix, "section-");
        assert_eq!(config.out_dir, dir.path().join("public"));
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[render\n").unwrap();
        assert!(WikiConfig::load(dir.path().to_path_buf()).is_err());
    }
}
