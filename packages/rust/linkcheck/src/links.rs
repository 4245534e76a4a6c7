//! Discovery of absolute external links in Markdown content.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// An external link found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    /// Destination text exactly as written.
    pub destination: String,
    /// Parsed absolute URL.
    pub url: Url,
}

static INLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // [text](url) and ![alt](url), optionally <url> and a "title"
    Regex::new(r#"\]\(\s*<?(https?://[^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).expect("valid regex")
});

static AUTOLINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(https?://[^>\s]+)>").expect("valid regex"));

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:href|src)\s*=\s*["'](https?://[^"']+)["']"#).expect("valid regex")
});

/// Collect distinct absolute `http(s)` links in document order.
pub fn extract_links(content: &str) -> Vec<DiscoveredLink> {
    let mut found: Vec<(usize, &str)> = [&*INLINE_RE, &*AUTOLINK_RE, &*HREF_RE]
        .into_iter()
        .flat_map(|re| re.captures_iter(content))
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str()))
        .collect();
    found.sort_by_key(|(start, _)| *start);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter(|(_, dest)| seen.insert(*dest))
        .filter_map(|(_, dest)| {
            Url::parse(dest).ok().map(|url| DiscoveredLink {
                destination: dest.to_string(),
                url,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_inline_autolinks_and_html() {
        let md = r#"# Guide

See [the docs](https://example.com/docs "Docs") and ![logo](https://cdn.example.com/logo.png).
Raw: <https://example.org/raw>
<a href="https://example.net/page?x=1">page</a>
Relative [link](./other.md) and [anchor](#top) are ignored, so is mailto:<me@example.com>.
Duplicate [again](https://example.com/docs).
"#;
        let links: Vec<String> = extract_links(md).into_iter().map(|l| l.destination).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/docs",
                "https://cdn.example.com/logo.png",
                "https://example.org/raw",
                "https://example.net/page?x=1",
            ]
        );
    }

    #[test]
    fn angle_bracket_destination_inside_inline_link() {
        let links = extract_links("[x](<https://example.com/a b>)");
        assert!(links.is_empty());

        let links = extract_links("[x](<https://example.com/a>)");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url.path(), "/a");
    }

    #[test]
    fn no_links() {
        assert!(extract_links("plain text").is_empty());
    }
}
