use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use comrak::adapters::{HeadingAdapter, HeadingMeta};
use comrak::nodes::{AstNode, NodeValue, Sourcepos};
use comrak::{format_html_with_plugins, parse_document, Arena, Options, Plugins};
use tracing::warn;

use crate::config::RenderConfig;
use crate::slug;
use crate::wikilink;

/// Render a document body to HTML.
///
/// Wiki-links are rewritten to ordinary links first, then the text goes
/// through CommonMark with GFM extensions and hard line breaks. Headings get a
/// stable id and a self-link; fenced code keeps its language as a
/// `language-*` class. Never fails: malformed constructs render as text.
pub fn render_markdown(content: &str, config: &RenderConfig) -> String {
    let source = wikilink::rewrite_wiki_links(content, &config.link_prefix);
    let options = options(config);
    let arena = Arena::new();
    let root = parse_document(&arena, &source, &options);

    let headings = AnchoredHeadings::new(&config.heading_id_prefix, root);
    let mut plugins = Plugins::default();
    plugins.render.heading_adapter = Some(&headings);

    let mut html = Vec::new();
    if let Err(e) = format_html_with_plugins(root, &options, &mut html, &plugins) {
        warn!("html rendering stopped early: {e}");
    }
    String::from_utf8_lossy(&html).into_owned()
}

fn options(config: &RenderConfig) -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.hardbreaks = true;
    options.render.unsafe_ = config.allow_raw_html;
    options
}

/// Writes `<hN id=..>` with the content wrapped in a link to the id. Headings
/// that already contain a link get the id only, since anchors cannot nest.
struct AnchoredHeadings<'a> {
    id_prefix: &'a str,
    /// One entry per heading, in document order.
    has_link: Vec<bool>,
    next: AtomicUsize,
    wrapped: AtomicBool,
}

impl<'a> AnchoredHeadings<'a> {
    fn new<'n>(id_prefix: &'a str, root: &'n AstNode<'n>) -> Self {
        let has_link = root
            .descendants()
            .filter(|n| matches!(n.data.borrow().value, NodeValue::Heading(_)))
            .map(|h| {
                h.descendants()
                    .skip(1)
                    .any(|n| matches!(n.data.borrow().value, NodeValue::Link(_)))
            })
            .collect();
        AnchoredHeadings {
            id_prefix,
            has_link,
            next: AtomicUsize::new(0),
            wrapped: AtomicBool::new(false),
        }
    }
}

impl HeadingAdapter for AnchoredHeadings<'_> {
    fn enter(
        &self,
        output: &mut dyn Write,
        heading: &HeadingMeta,
        _sourcepos: Option<Sourcepos>,
    ) -> io::Result<()> {
        let nth = self.next.fetch_add(1, Ordering::Relaxed);
        let wrap = !self.has_link.get(nth).copied().unwrap_or(false);
        self.wrapped.store(wrap, Ordering::Relaxed);

        let id = escape_attr(&slug::heading_anchor(self.id_prefix, &heading.content));
        write!(output, "<h{} id=\"{id}\">", heading.level)?;
        if wrap {
            write!(output, "<a href=\"#{id}\">")?;
        }
        Ok(())
    }

    fn exit(&self, output: &mut dyn Write, heading: &HeadingMeta) -> io::Result<()> {
        if self.wrapped.load(Ordering::Relaxed) {
            output.write_all(b"</a>")?;
        }
        writeln!(output, "</h{}>", heading.level)
    }
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
