mod cli;
mod config;
mod folder_tree;
mod index;
mod markdown;
mod model;
mod note_ops;
mod parser;
mod site;
mod slug;
mod watcher;
mod wikilink;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use cli::{Cli, Command, PageArgs};
use config::WikiConfig;
use index::{ListQuery, NoteIndex};
use model::Document;

#[tokio::main]
async fn main() -> Result<()> {
    // Tracing writes to stderr (stdout carries command output)
    fmt()
        .with_env_filter(
            EnvFilter::try_from_env("NOTEWIKI_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(WikiConfig::resolve(cli.wiki_root)?);

    match cli.command {
        Command::Tree { folder, json } => {
            let index = load_index(&config).await?;
            let mut tree = index.folder_tree();
            tree.sort_children();
            let node = match folder.as_deref() {
                Some(path) => tree
                    .find_folder(path)
                    .with_context(|| format!("no folder {path}"))?,
                None => &tree,
            };
            info!("{} documents under {}", node.documents().len(), node.path);
            if json {
                println!("{}", serde_json::to_string_pretty(node)?);
            } else {
                print!("{}", node.outline());
            }
        }
        Command::Render {
            file,
            link_prefix,
            heading_id_prefix,
        } => {
            let doc = read_document(&config, &file).await?;
            let mut render = config.render.clone();
            if let Some(prefix) = link_prefix {
                render.link_prefix = prefix;
            }
            if let Some(prefix) = heading_id_prefix {
                render.heading_id_prefix = prefix;
            }
            print!("{}", markdown::render_markdown(&doc.body, &render));
        }
        Command::Links { file } => {
            let doc = read_document(&config, &file).await?;
            for slug in wikilink::extract_internal_links(&doc.body) {
                println!("{slug}");
            }
        }
        Command::Backlinks { slug } => {
            let index = load_index(&config).await?;
            if index.find_by_slug(&slug).is_none() {
                eprintln!("note: no document has slug {slug}");
            }
            for loc in index.get_backlinks(&slug) {
                let title = index.get(&loc.source).map(|d| d.title).unwrap_or_default();
                println!("{}:{}\t{title}", loc.source, loc.line + 1);
            }
        }
        Command::Categories => {
            let index = load_index(&config).await?;
            for category in index.categories() {
                println!("{}\t{}\t{}", category.slug, category.count, category.name);
            }
        }
        Command::Search { query, page } => {
            let index = load_index(&config).await?;
            print_documents(&index.search(&query, &list_query(page)));
        }
        Command::List { page } => {
            let index = load_index(&config).await?;
            print_documents(&index.list(&list_query(page)));
        }
        Command::New {
            title,
            folder,
            template,
        } => {
            let path = note_ops::create_note(&config, &title, folder.as_deref(), template).await?;
            println!("{}", path.display());
        }
        Command::Pin { file } => {
            let path = locate(&config, &file);
            let pinned = note_ops::toggle_pin(&path).await?;
            println!("{}", if pinned { "pinned" } else { "unpinned" });
        }
        Command::Slug { title } => {
            println!("link: {}", slug::link_slug(&title));
            println!("post: {}", slug::post_slug(&title));
        }
        Command::Build { out, watch } => {
            let out_dir = out.unwrap_or_else(|| config.out_dir.clone());
            let index = Arc::new(load_index(&config).await?);
            site::build_site(&index, &config, &out_dir).await?;
            if watch {
                info!("watching {} for changes", config.root.display());
                let handle = watcher::start_watcher(Arc::clone(&config), index, out_dir)?;
                handle.await?;
            }
        }
    }
    Ok(())
}

async fn load_index(config: &Arc<WikiConfig>) -> Result<NoteIndex> {
    let index = NoteIndex::new(Arc::clone(config));
    let n = index.rebuild_full().await?;
    info!("index built: {n} documents");
    Ok(index)
}

/// Resolve a CLI file argument: as given if it exists, else relative to the root.
fn locate(config: &WikiConfig, file: &Path) -> PathBuf {
    if file.exists() || file.is_absolute() {
        file.to_path_buf()
    } else {
        config.root.join(file)
    }
}

async fn read_document(config: &WikiConfig, file: &Path) -> Result<Document> {
    let path = locate(config, file);
    let content = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let id = path
        .strip_prefix(&config.root)
        .unwrap_or(&path)
        .to_string_lossy()
        .replace('\\', "/");
    Ok(parser::parse_document(&id, &content))
}

fn list_query(page: PageArgs) -> ListQuery {
    ListQuery {
        tag: page.tag,
        category: page.category,
        offset: page.offset,
        limit: page.limit,
    }
}

fn print_documents(docs: &[Document]) {
    for doc in docs {
        let pin = if doc.pinned() { "*" } else { " " };
        let date = doc.date().map(|d| d.to_string()).unwrap_or_default();
        println!("{pin} {:<10} {}\t{}", date, doc.title, doc.path);
    }
}
