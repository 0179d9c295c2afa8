//! Slug and anchor derivations. The wiki-link slug and the post slug are
//! different functions and must stay separate.
use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_NON_WORD_OR_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").unwrap());

/// Target slug for a `[[wiki link]]`: lowercase, whitespace runs become `-`,
/// every other character is kept verbatim.
pub fn link_slug(text: &str) -> String {
    RE_WHITESPACE
        .replace_all(&text.to_lowercase(), "-")
        .into_owned()
}

/// Slug assigned to a new post from its title: like `link_slug`, but
/// punctuation is dropped first.
pub fn post_slug(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = RE_NON_WORD_OR_SPACE.replace_all(&lower, "");
    RE_WHITESPACE.replace_all(&stripped, "-").into_owned()
}

/// Heading id: `prefix` followed by the lowercased text with each run of
/// non-word characters replaced by a single `-`.
pub fn heading_anchor(prefix: &str, text: &str) -> String {
    let lower = text.to_lowercase();
    let anchor = RE_NON_WORD.replace_all(&lower, "-");
    format!("{prefix}{anchor}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_slug() {
        assert_eq!(link_slug("Foo Bar"), "foo-bar");
        assert_eq!(link_slug("Beta   Two\tThree"), "beta-two-three");
        assert_eq!(link_slug("C++ & Rust"), "c++-&-rust");
    }

    #[test]
    fn test_post_slug_strips_punctuation() {
        assert_eq!(post_slug("Hello, World!"), "hello-world");
        assert_eq!(link_slug("Hello, World!"), "hello,-world!");
        assert_eq!(post_slug("snake_case stays"), "snake_case-stays");
    }

    #[test]
    fn test_heading_anchor() {
        assert_eq!(heading_anchor("section-", "Hello World"), "section-hello-world");
        assert_eq!(heading_anchor("", "What's new?"), "what-s-new-");
        assert_eq!(heading_anchor("h-", "a -- b"), "h-a-b");
        assert_eq!(heading_anchor("section-", "Ünïcode Wörds"), "section-ünïcode-wörds");
    }
}
