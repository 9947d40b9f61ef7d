//! Hyperlink discovery.

use scraper::{Html, Selector};
use url::Url;

/// Schemes and prefixes that never lead to another page.
const SKIPPED_PREFIXES: [&str; 4] = ["#", "javascript:", "mailto:", "tel:"];

/// Extract every hyperlink target from a document, resolved against `base_url`.
///
/// Fragments are stripped; order follows document order and duplicates are kept
/// (deduplication is the frontier's job).
pub fn extract_links(doc: &Html, base_url: &Url) -> Vec<String> {
    let Ok(link_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    doc.select(&link_sel)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter(|href| {
            let lower = href.to_ascii_lowercase();
            !SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p))
        })
        .filter_map(|href| base_url.join(href).ok())
        .map(|mut resolved| {
            resolved.set_fragment(None);
            resolved.to_string()
        })
        .collect()
}

/// Parse `markup` and extract its links.
pub fn extract_links_from_markup(markup: &str, base_url: &Url) -> Vec<String> {
    extract_links(&Html::parse_document(markup), base_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_resolves_links() {
        let html = r##"<html><body><a href="/page2">Page 2</a><a href="https://external.com">External</a><a href="#section">Anchor</a><a href="relative/path">Relative</a></body></html>"##;

        let base = Url::parse("https://docs.example.com/guide/page1").unwrap();
        let links = extract_links_from_markup(html, &base);

        assert_eq!(
            links,
            vec![
                "https://docs.example.com/page2",
                "https://external.com/",
                "https://docs.example.com/guide/relative/path",
            ]
        );
    }

    #[test]
    fn skips_script_and_mail_links() {
        let html = r#"<a href="javascript:void(0)">x</a><a href="MAILTO:a@b.c">m</a><a href="tel:123">t</a><a href="">e</a>"#;
        let base = Url::parse("https://docs.example.com/").unwrap();
        assert!(extract_links_from_markup(html, &base).is_empty());
    }

    #[test]
    fn strips_fragments_and_keeps_duplicates() {
        let html = r#"<a href="setup#install">a</a><a href="setup">b</a>"#;
        let base = Url::parse("https://docs.example.com/guide/intro").unwrap();
        let links = extract_links_from_markup(html, &base);
        assert_eq!(
            links,
            vec![
                "https://docs.example.com/guide/setup",
                "https://docs.example.com/guide/setup",
            ]
        );
    }

    #[test]
    fn resolves_against_directory_base() {
        let html = r#"<a href="setup">Setup</a>"#;
        let base = Url::parse("https://docs.example.com/guide/").unwrap();
        assert_eq!(
            extract_links_from_markup(html, &base),
            vec!["https://docs.example.com/guide/setup"]
        );
    }
}
