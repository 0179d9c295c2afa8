//! `[[Wiki Link]]` scanning and rewriting.
//!
//! Links inside code (fenced blocks, indented blocks and inline spans) are left
//! alone, both when extracting and when rewriting, so the two always agree.
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::slug;

// Non-greedy so that `[[a]] [[b]]` yields two links; `.` never crosses a newline.
static RE_WIKILINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[(.*?)\]\]").unwrap());
static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {0,3}(?:[-+*]|\d{1,9}[.)])(?:[ \t\r\n]|$)").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct WikiLink<'a> {
    /// The text between the brackets, unchanged.
    pub display: &'a str,
    /// Byte range of the whole `[[...]]` occurrence.
    pub range: Range<usize>,
}

impl WikiLink<'_> {
    pub fn slug(&self) -> String {
        slug::link_slug(self.display)
    }
}

/// Lazily iterate over every wiki-link in `text` outside code.
pub fn wiki_links(text: &str) -> impl Iterator<Item = WikiLink<'_>> + '_ {
    let code = code_ranges(text);
    RE_WIKILINK.captures_iter(text).filter_map(move |cap| {
        let whole = cap.get(0)?;
        let inner = cap.get(1)?;
        if inner.as_str().trim().is_empty() {
            return None;
        }
        if code.iter().any(|r| r.start <= whole.start() && whole.start() < r.end) {
            return None;
        }
        Some(WikiLink {
            display: inner.as_str(),
            range: whole.range(),
        })
    })
}

/// Slugs referenced by the wiki-links of `text`, in order of appearance.
/// Unterminated `[[` produces nothing.
pub fn extract_internal_links(text: &str) -> impl Iterator<Item = String> + '_ {
    wiki_links(text).map(|l| l.slug())
}

/// Replace each wiki-link with a markdown link to `<link_prefix><slug>`.
/// The display text is backslash-escaped so it renders verbatim.
pub fn rewrite_wiki_links(text: &str, link_prefix: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for link in wiki_links(text) {
        out.push_str(&text[last..link.range.start]);
        out.push('[');
        out.push_str(&escape_link_text(link.display));
        out.push_str("](<");
        out.push_str(&escape_destination(&format!("{link_prefix}{}", link.slug())));
        out.push_str(">)");
        last = link.range.end;
    }
    out.push_str(&text[last..]);
    out
}

fn escape_link_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_punctuation() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_destination(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '<' | '>' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Byte ranges covered by fenced code blocks, indented code blocks and inline
/// code spans. An unclosed fence runs to the end of the text; an unmatched
/// backtick run is plain text. An indented line only opens a code block after
/// a blank line and outside a list, otherwise it continues a paragraph.
fn code_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut fence: Option<(char, usize, usize)> = None; // (char, len, start)
    let mut indented: Option<usize> = None;
    let mut prose_start = 0;
    let mut prev_blank = true;
    let mut in_list = false;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let blank = line.trim().is_empty();

        if let Some((ch, len, start)) = fence {
            if let Some((c, n, rest)) = fence_marker(line) {
                if c == ch && n >= len && rest.trim().is_empty() {
                    ranges.push(start..offset);
                    fence = None;
                    prose_start = offset;
                    prev_blank = true;
                }
            }
            continue;
        }

        if let Some(start) = indented {
            if blank || indent_width(line) >= 4 {
                continue;
            }
            ranges.push(start..line_start);
            indented = None;
            prose_start = line_start;
        }

        if let Some((c, n, rest)) = fence_marker(line) {
            // backtick fences may not have backticks in the info string
            if c == '~' || !rest.contains('`') {
                inline_code_ranges(text, prose_start..line_start, &mut ranges);
                fence = Some((c, n, line_start));
                continue;
            }
        }

        if !blank && prev_blank && !in_list && indent_width(line) >= 4 {
            inline_code_ranges(text, prose_start..line_start, &mut ranges);
            indented = Some(line_start);
            continue;
        }

        if RE_LIST_ITEM.is_match(line) {
            in_list = true;
        } else if !blank && prev_blank && indent_width(line) < 2 {
            in_list = false;
        }
        prev_blank = blank;
    }

    match (fence, indented) {
        (Some((_, _, start)), _) | (None, Some(start)) => ranges.push(start..text.len()),
        (None, None) => inline_code_ranges(text, prose_start..text.len(), &mut ranges),
    }
    ranges
}

/// Leading whitespace width, with tabs advancing to the next multiple of 4.
fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4 - width % 4,
            _ => break,
        }
    }
    width
}

/// Parse an opening/closing fence: up to three spaces of indent, then three
/// or more backticks or tildes.
fn fence_marker(line: &str) -> Option<(char, usize, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let body = &line[indent..];
    let ch = body.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = body.len() - body.trim_start_matches(ch).len();
    if len < 3 {
        return None;
    }
    Some((ch, len, &body[len..]))
}

fn inline_code_ranges(text: &str, span: Range<usize>, ranges: &mut Vec<Range<usize>>) {
    let bytes = text.as_bytes();
    let mut i = span.start;
    while i < span.end {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let open_start = i;
        while i < span.end && bytes[i] == b'`' {
            i += 1;
        }
        let run = i - open_start;

        // look for a closing run of exactly the same length
        let mut j = i;
        let mut close = None;
        while j < span.end {
            if bytes[j] != b'`' {
                j += 1;
                continue;
            }
            let start = j;
            while j < span.end && bytes[j] == b'`' {
                j += 1;
            }
            if j - start == run {
                close = Some(j);
                break;
            }
        }

        if let Some(end) = close {
            ranges.push(open_start..end);
            i = end;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(text: &str) -> Vec<String> {
        extract_internal_links(text).collect()
    }

    #[test]
    fn test_extract_in_order() {
        assert_eq!(links("See [[Alpha]] and [[Beta Two]]"), vec!["alpha", "beta-two"]);
    }

    #[test]
    fn test_extract_keeps_duplicates() {
        assert_eq!(links("[[A]] [[B]] [[a]]"), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_unterminated() {
        assert!(links("unterminated [[oops").is_empty());
        assert!(links("[[broken\nacross lines]]").is_empty());
        assert_eq!(links("[[oops and [[ok]]"), vec!["oops-and-[[ok"]);
    }

    #[test]
    fn test_adjacent_links_not_merged() {
        let found: Vec<&str> = wiki_links("[[One]][[Two]]").map(|l| l.display).collect();
        assert_eq!(found, vec!["One", "Two"]);
    }

    #[test]
    fn test_empty_brackets_ignored() {
        assert!(links("[[]] and [[  ]]").is_empty());
    }

    #[test]
    fn test_ignores_fenced_code() {
        let text = "```\n[[CodeLink]]\n```\nOutside [[RealLink]]";
        assert_eq!(links(text), vec!["reallink"]);
        let tilde = "~~~rust\n[[Hidden]]\n~~~~\n[[Shown]]";
        assert_eq!(links(tilde), vec!["shown"]);
    }

    #[test]
    fn test_unclosed_fence_swallows_rest() {
        assert_eq!(links("[[Before]]\n```\n[[Inside]]"), vec!["before"]);
    }

    #[test]
    fn test_ignores_inline_code() {
        assert_eq!(links("See `[[Fake]]` but [[Real]]"), vec!["real"]);
        assert_eq!(links("``a ` [[Fake]]`` [[Real]]"), vec!["real"]);
        // a lone backtick is literal
        assert_eq!(links("it`s [[Real]]"), vec!["real"]);
    }

    #[test]
    fn test_ignores_indented_code() {
        assert_eq!(links("para\n\n    let x = [[Foo]];\n[[Bar]]"), vec!["bar"]);
        assert!(links("\t[[Tab]]\n\n        [[Deeper]]\n").is_empty());
        // no blank line before: the indented line continues the paragraph
        assert_eq!(links("para\n    [[Lazy]]"), vec!["lazy"]);
        // indented content of a list item is not code
        assert_eq!(links("- item\n\n    [[InList]]"), vec!["inlist"]);
        assert_eq!(links("```\ncode\n```\n    [[AfterFence]]"), Vec::<String>::new());
    }

    #[test]
    fn test_rewrite() {
        assert_eq!(
            rewrite_wiki_links("See [[Foo Bar]].", "/posts/"),
            "See [Foo Bar](</posts/foo-bar>)."
        );
        assert_eq!(
            rewrite_wiki_links("[[C++ (2)]]", "/wiki/"),
            r"[C\+\+ \(2\)](</wiki/c++-(2)>)"
        );
        assert_eq!(rewrite_wiki_links("no links", "/posts/"), "no links");
        assert_eq!(rewrite_wiki_links("`[[x]]`", "/posts/"), "`[[x]]`");
    }

    #[test]
    fn test_rewrite_escapes_angle_brackets_in_target() {
        assert_eq!(rewrite_wiki_links("[[a<b]]", "/p/"), r"[a\<b](</p/a\<b>)");
    }
}
