//! Static attachment links on the top-level page.

use scraper::{Html, Selector};

use crate::utils::{absolutize, extract_href_values, AttachmentRules};

/// Attachment URLs visible in `html`, absolute and deduplicated in page order.
///
/// Anchors are read first, then a raw `href=` search over the markup picks
/// up links the parser does not see as anchors.
pub fn find_direct_links(html: &str, base_url: &str, rules: &AttachmentRules) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let mut push = |href: &str| {
        let href = href.trim();
        if href.is_empty()
            || href.to_lowercase().starts_with("javascript")
            || !rules.is_attachment_shaped(href)
        {
            return;
        }
        if let Some(url) = absolutize(base_url, href) {
            if !links.contains(&url) {
                links.push(url);
            }
        }
    };

    let document = Html::parse_document(html);
    if let Ok(anchors) = Selector::parse("a[href]") {
        for anchor in document.select(&anchors) {
            if let Some(href) = anchor.value().attr("href") {
                push(href);
            }
        }
    }

    for href in extract_href_values(html) {
        push(&href);
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_and_markup_links_are_merged() {
        let html = r#"
            <html><body>
              <a href="http://site/x.zip">Archive</a>
              <a href="/files/tender.pdf">Tender</a>
              <a href="javascript:void('y.pdf')">Script</a>
              <a href="/detail/9">Next</a>
              <link href="files/extra.docx?v=2">
              <a href="/files/tender.pdf">Tender again</a>
            </body></html>
        "#;
        let links = find_direct_links(html, "http://site/detail/7", &AttachmentRules::default());
        assert_eq!(
            links,
            vec![
                "http://site/x.zip",
                "http://site/files/tender.pdf",
                "http://site/detail/files/extra.docx?v=2",
            ]
        );
    }

    #[test]
    fn test_escaped_query_is_one_link() {
        let html = r#"<a href="/files/a.pdf?x=1&amp;y=2">File</a>"#;
        let links = find_direct_links(html, "http://site/detail/7", &AttachmentRules::default());
        assert_eq!(links, vec!["http://site/files/a.pdf?x=1&y=2"]);
    }

    #[test]
    fn test_no_links() {
        let links = find_direct_links("<p>nothing</p>", "http://site/", &AttachmentRules::default());
        assert!(links.is_empty());
    }
}
