//! Main-content extraction driven by an ordered selector list.
//!
//! Selectors are configuration data ([`ContentSelector`]) tried from most
//! specific (a known documentation theme container) to least specific
//! (generic `main`/`article`). The first selector with a non-empty match
//! wins; `<body>` is the final fallback.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use docharvest_shared::{ContentSelector, HarvestError, Result, default_selectors};

/// Result of content extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Inner markup of the selected node; empty when the document has no body content.
    pub html: String,
    /// Label of the selector that matched, `None` for the `<body>` fallback.
    pub matched: Option<String>,
}

/// Picks the node holding a page's substantive content.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    selectors: Vec<ContentSelector>,
}

impl ContentExtractor {
    /// Build an extractor, validating every CSS selector up front.
    pub fn new(selectors: Vec<ContentSelector>) -> Result<Self> {
        for sel in &selectors {
            Selector::parse(&sel.css).map_err(|e| {
                HarvestError::config(format!("invalid content selector '{}' ({}): {e}", sel.css, sel.label))
            })?;
        }
        Ok(Self { selectors })
    }

    pub fn selectors(&self) -> &[ContentSelector] {
        &self.selectors
    }

    /// Select the main content of a full HTML document.
    pub fn extract(&self, markup: &str) -> Extraction {
        let doc = Html::parse_document(markup);
        self.extract_from(&doc)
    }

    /// Select the main content of an already-parsed document.
    pub fn extract_from(&self, doc: &Html) -> Extraction {
        for sel in &self.selectors {
            let Ok(selector) = Selector::parse(&sel.css) else {
                continue;
            };

            if let Some(html) = doc.select(&selector).find_map(non_empty_inner_html) {
                debug!(selector = %sel.label, len = html.len(), "content selector matched");
                return Extraction {
                    html,
                    matched: Some(sel.label.clone()),
                };
            }
        }

        debug!("no content selector matched, falling back to <body>");
        Extraction {
            html: body_html(doc),
            matched: None,
        }
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self {
            selectors: default_selectors(),
        }
    }
}

/// Extract the main content markup of `markup` with the built-in selectors.
pub fn extract_main_content(markup: &str) -> String {
    ContentExtractor::default().extract(markup).html
}

fn non_empty_inner_html(el: ElementRef<'_>) -> Option<String> {
    let html = el.inner_html();
    if html.trim().is_empty() {
        None
    } else {
        Some(html)
    }
}

fn body_html(doc: &Html) -> String {
    let Ok(body_sel) = Selector::parse("body") else {
        return String::new();
    };
    doc.select(&body_sel)
        .next()
        .map(|el| el.inner_html())
        .unwrap_or_default()
}
