use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::note_ops::Template;

#[derive(Parser)]
#[command(name = "notewiki", about = "Markdown notes: folder tree, wiki-links and static rendering")]
pub struct Cli {
    /// Path to wiki root (overrides WIKI_ROOT env and ~/wiki default)
    #[arg(long, global = true)]
    pub wiki_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the folder tree of all documents
    Tree {
        /// Only print the subtree rooted at this folder path (e.g. /py/)
        #[arg(long)]
        folder: Option<String>,
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render one document to HTML on stdout
    Render {
        file: PathBuf,
        /// Route prefix for wiki-link targets (default from notewiki.toml or /posts/)
        #[arg(long)]
        link_prefix: Option<String>,
        /// Prefix for heading ids (default from notewiki.toml or section-)
        #[arg(long)]
        heading_id_prefix: Option<String>,
    },
    /// Print the wiki-link slugs of a document, one per line
    Links { file: PathBuf },
    /// Print the documents linking to a slug
    Backlinks { slug: String },
    /// List the categories in use with their document counts
    Categories,
    /// Search titles, bodies and excerpts (case-insensitive substring)
    Search {
        query: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// List documents: pinned first, then newest first
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Create a new document and print its path to stdout
    New {
        title: String,
        /// Folder under the wiki root, e.g. py/basics
        #[arg(long)]
        folder: Option<String>,
        /// Start from a built-in template
        #[arg(long, value_enum)]
        template: Option<Template>,
    },
    /// Toggle the pinned flag of a document
    Pin { file: PathBuf },
    /// Print the link slug and the post slug of a title
    Slug { title: String },
    /// Render every document into a static site
    Build {
        /// Output directory (overrides [site].out_dir)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Keep running and rebuild on changes
        #[arg(long)]
        watch: bool,
    },
}

#[derive(clap::Args)]
pub struct PageArgs {
    /// Only documents carrying this tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Only documents in this category (name or slug)
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
    #[arg(long)]
    pub limit: Option<usize>,
}
