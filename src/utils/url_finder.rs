//! Attachment URL extraction from markup and response bodies.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::AttachmentRules;

static HREF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href=['"]([^'"]+)['"]"#).expect("href regex should compile"));

/// Finds absolute attachment URLs in unstructured text.
pub struct UrlFinder {
    url_regex: Regex,
}

impl UrlFinder {
    pub fn new(rules: &AttachmentRules) -> Self {
        let pattern = format!(
            r#"(?i)(https?://[^\s"'<>]+(?:{}))"#,
            rules.extension_pattern()
        );
        let url_regex = Regex::new(&pattern).expect("escaped extension alternation should compile");
        Self { url_regex }
    }

    /// All distinct matches, in order of appearance.
    pub fn find_urls(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.url_regex
            .captures_iter(text)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    pub fn first_url(&self, text: &str) -> Option<String> {
        self.url_regex
            .captures(text)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// Every `href="..."` value in raw markup, entity-decoded, in document order.
pub fn extract_href_values(html: &str) -> Vec<String> {
    HREF_ATTR
        .captures_iter(html)
        .filter_map(|cap| {
            cap.get(1)
                .map(|m| html_escape::decode_html_entities(m.as_str().trim()).into_owned())
        })
        .filter(|href| !href.is_empty())
        .collect()
}

/// Resolve `href` against `base`. Absolute inputs come back unchanged.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    if let Ok(url) = Url::parse(href) {
        return Some(url.to_string());
    }
    Url::parse(base)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_urls_in_raw_body() {
        let finder = UrlFinder::new(&AttachmentRules::default());
        let body = r#"callback({ok:1, link:'http://files/dir/a.pdf'}); see https://x/y.ZIP and http://files/dir/a.pdf"#;
        assert_eq!(
            finder.find_urls(body),
            vec!["http://files/dir/a.pdf".to_string(), "https://x/y.ZIP".to_string()]
        );
    }

    #[test]
    fn test_first_url_ignores_non_attachments() {
        let finder = UrlFinder::new(&AttachmentRules::default());
        assert_eq!(finder.first_url("http://site/page.html"), None);
        assert_eq!(
            finder.first_url("<a>http://site/page.html</a> http://files/b.xlsx"),
            Some("http://files/b.xlsx".to_string())
        );
    }

    #[test]
    fn test_extract_href_values() {
        let html = r#"<a href="/files/a.pdf">a</a><A HREF='b.doc'>b</A><link href="">"#;
        assert_eq!(extract_href_values(html), vec!["/files/a.pdf", "b.doc"]);
    }

    #[test]
    fn test_extract_href_values_decodes_entities() {
        let html = r#"<a href="a.pdf?x=1&amp;y=2">a</a>"#;
        assert_eq!(extract_href_values(html), vec!["a.pdf?x=1&y=2"]);
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize("http://site/detail/7", "../files/a.pdf").as_deref(),
            Some("http://site/files/a.pdf")
        );
        assert_eq!(
            absolutize("http://site/detail/7", "http://cdn/x.zip").as_deref(),
            Some("http://cdn/x.zip")
        );
        assert_eq!(absolutize("not a url", "a.pdf"), None);
    }
}
