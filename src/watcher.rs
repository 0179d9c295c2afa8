use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebouncedEvent};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::WikiConfig;
use crate::index::{self, NoteIndex};
use crate::site;

/// Start the filesystem watcher on the wiki root. Changed documents are
/// re-indexed and the site in `out_dir` is rebuilt once per debounced batch.
pub fn start_watcher(
    config: Arc<WikiConfig>,
    index: Arc<NoteIndex>,
    out_dir: PathBuf,
) -> Result<tokio::task::JoinHandle<()>> {
    let (tx, mut rx) = mpsc::channel::<Vec<DebouncedEvent>>(64);
    let (fs_tx, fs_rx) = std::sync::mpsc::channel();

    let mut debouncer =
        new_debouncer(Duration::from_millis(300), fs_tx).context("creating file watcher")?;
    debouncer
        .watcher()
        .watch(&config.root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {}", config.root.display()))?;

    // The debouncer lives on this thread; dropping it would stop the watch.
    std::thread::spawn(move || {
        let _debouncer = debouncer;
        for result in fs_rx {
            match result {
                Ok(events) => {
                    if tx.blocking_send(events).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("watcher error: {e:?}");
                }
            }
        }
    });

    let handle = tokio::spawn(async move {
        while let Some(events) = rx.recv().await {
            let mut changed = false;
            for event in events {
                let path = event.path;
                if !is_document(&config, &path) {
                    continue;
                }
                changed = true;
                if path.exists() {
                    info!("document changed/created: {}", path.display());
                    if let Err(e) = index.update_file(&path).await {
                        error!("re-index failed for {}: {e:#}", path.display());
                    }
                } else {
                    info!("document removed: {}", path.display());
                    index.remove_by_path(&path);
                }
            }
            if changed {
                if let Err(e) = site::build_site(&index, &config, &out_dir).await {
                    error!("site rebuild failed: {e:#}");
                }
            }
        }
    });

    Ok(handle)
}

fn is_document(config: &WikiConfig, path: &Path) -> bool {
    index::is_markdown_file(path) && !config.is_output(path)
}
