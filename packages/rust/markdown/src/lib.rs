//! HTML-to-Markdown conversion, cleanup passes, and boilerplate trimming.
//!
//! Converts extracted content fragments to Markdown using the `htmd` crate, then
//! applies a series of cleanup passes to normalize headings, whitespace, code
//! blocks, and links. [`trim_boilerplate`] drops navigation and breadcrumb
//! text left above a page's title.

mod cleanup;

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use tracing::{debug, instrument};
use url::Url;

use docharvest_shared::{HarvestError, Result};

/// Tags whose content never belongs in the Markdown output.
const SKIPPED_TAGS: [&str; 6] = ["script", "style", "nav", "iframe", "noscript", "svg"];

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Convert an HTML fragment to clean Markdown.
///
/// 1. Pre-processes HTML tables into markdown tables
/// 2. Converts HTML → Markdown via `htmd`
/// 3. Runs the cleanup pipeline, resolving relative links against `base_url`
#[instrument(skip(fragment), fields(base_url = base_url.map(Url::as_str).unwrap_or("")))]
pub fn to_markdown(fragment: &str, base_url: Option<&Url>) -> Result<String> {
    if fragment.trim().is_empty() {
        return Ok(String::new());
    }

    let content_html = preprocess_tables(fragment);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();

    let raw_markdown = converter
        .convert(&content_html)
        .map_err(|e| HarvestError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(raw_len = raw_markdown.len(), "htmd conversion complete");

    Ok(cleanup::run_pipeline(&raw_markdown, base_url))
}

/// Drop every line before the first top-level heading (`# `).
///
/// Lines inside fenced code blocks are never treated as headings. Input without
/// a top-level heading is returned unchanged.
pub fn trim_boilerplate(markdown: &str) -> String {
    let mut in_code_block = false;
    let mut offset = 0;

    for line in markdown.split_inclusive('\n') {
        if cleanup::is_fence(line) {
            in_code_block = !in_code_block;
        } else if !in_code_block && line.starts_with("# ") {
            return markdown[offset..].to_string();
        }
        offset += line.len();
    }

    markdown.to_string()
}

/// Extract title from the first H1 in the Markdown text.
pub fn extract_title(md: &str) -> Option<String> {
    static H1_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^# (.+)$").expect("valid regex"));

    H1_RE
        .captures(md)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

// ---------------------------------------------------------------------------
// Table pre-processing
// ---------------------------------------------------------------------------

/// Convert HTML `<table>` elements to markdown table syntax before htmd conversion.
///
/// `htmd` 0.1 doesn't support table conversion, so we handle it manually.
fn preprocess_tables(html: &str) -> String {
    let Ok(table_sel) = scraper::Selector::parse("table") else {
        return html.to_string();
    };

    let doc = Html::parse_fragment(html);
    if doc.select(&table_sel).next().is_none() {
        return html.to_string();
    }

    let mut result = html.to_string();
    for table_el in doc.select(&table_sel) {
        let md_table = html_table_to_markdown(&table_el);
        result = result.replacen(&table_el.html(), &md_table, 1);
    }

    result
}

/// Convert a single HTML table element to a markdown table string.
fn html_table_to_markdown(table: &scraper::ElementRef) -> String {
    let (Ok(tr_sel), Ok(cell_sel)) = (
        scraper::Selector::parse("tr"),
        scraper::Selector::parse("th, td"),
    ) else {
        return String::new();
    };

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut has_header = false;

    for (i, tr) in table.select(&tr_sel).enumerate() {
        let cells: Vec<String> = tr
            .select(&cell_sel)
            .map(|cell| cell_text(&cell))
            .collect();
        if cells.is_empty() {
            continue;
        }
        if i == 0 && tr.select(&cell_sel).all(|c| c.value().name() == "th") {
            has_header = true;
        }
        rows.push(cells);
    }

    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }

    for row in &mut rows {
        row.resize(col_count, String::new());
    }

    let mut md = String::from("\n\n");
    let render_row = |row: &[String]| format!("| {} |\n", row.join(" | "));

    // Header row: the real header, or an empty one so the table stays valid.
    let data_start = if has_header {
        md.push_str(&render_row(&rows[0]));
        1
    } else {
        md.push_str(&render_row(&vec![String::new(); col_count]));
        0
    };

    md.push_str(&render_row(&vec!["---".to_string(); col_count]));

    for row in &rows[data_start..] {
        md.push_str(&render_row(row));
    }

    md.push('\n');
    md
}

/// Cell text with whitespace collapsed and pipes escaped.
fn cell_text(cell: &scraper::ElementRef) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(html: &str) -> String {
        let base = Url::parse("https://docs.example.com/guide/page").unwrap();
        to_markdown(html, Some(&base)).unwrap()
    }

    // --- Core conversion tests ---

    #[test]
    fn convert_simple_fragment() {
        let md = convert("<h1>Hello World</h1><p>Some text.</p>");
        assert!(md.contains("# Hello World"));
        assert!(md.contains("Some text."));
        assert!(md.ends_with('\n'));
    }

    #[test]
    fn convert_preserves_code_blocks() {
        let md = convert(
            r#"<h1>Code Example</h1>
            <pre><code class="language-rust">fn main() {
    println!("hello");
}</code></pre>"#,
        );
        assert!(md.contains("```rust"));
        assert!(md.contains("println!"));
    }

    #[test]
    fn convert_leaves_code_block_contents_alone() {
        let md = convert(
            "<h1>Indexing</h1><pre><code>let v = arr[i](x);\n[a](b)\n\n\n\n\nend</code></pre>",
        );
        assert!(md.contains("let v = arr[i](x);"), "got: {md}");
        assert!(md.contains("[a](b)\n\n\n\n\nend"), "got: {md}");
        assert!(!md.contains("docs.example.com"));
    }

    #[test]
    fn convert_preserves_tables() {
        let md = convert(
            r#"<h1>Data</h1>
            <table>
                <thead><tr><th>Name</th><th>Value</th></tr></thead>
                <tbody>
                    <tr><td>foo</td><td>bar</td></tr>
                    <tr><td>baz</td><td>qux</td></tr>
                </tbody>
            </table>"#,
        );
        assert!(md.contains("| Name | Value |"));
        assert!(md.contains("| --- | --- |"));
        assert!(md.contains("| foo | bar |"));
    }

    #[test]
    fn convert_handles_lists_and_emphasis() {
        let md = convert(
            r#"<h1>Lists</h1>
            <ul><li>Item one</li><li>Item <strong>two</strong></li></ul>
            <ol><li>First</li><li>Second</li></ol>"#,
        );
        assert!(md.contains("Item one"));
        assert!(md.contains("**two**"));
        assert!(md.contains("First"));
    }

    #[test]
    fn convert_keeps_links_as_markdown_links() {
        let md = convert(r#"<h1>Links</h1><p>See <a href="/api/ref">the reference</a>.</p>"#);
        assert!(md.contains("[the reference](https://docs.example.com/api/ref)"));
    }

    #[test]
    fn convert_skips_scripts_and_nav() {
        let md = convert(
            r#"<nav><a href="/">Home</a></nav><h1>Body</h1><script>alert(1)</script><p>Kept.</p>"#,
        );
        assert!(md.contains("Kept."));
        assert!(!md.contains("alert"));
        assert!(!md.contains("[Home]"));
    }

    #[test]
    fn convert_no_html_tags_in_output() {
        let md = convert(
            r#"<h1>Clean Output</h1>
            <p>This should be <strong>clean</strong> markdown.</p>
            <div class="note"><p>A note.</p></div>"#,
        );
        assert!(!md.contains("<p>"), "output contains <p> tags");
        assert!(!md.contains("<h1>"), "output contains <h1> tags");
        assert!(md.contains("A note."));
    }

    #[test]
    fn convert_empty_fragment() {
        assert_eq!(to_markdown("", None).unwrap(), "");
        assert_eq!(to_markdown("   \n ", None).unwrap(), "");
    }

    // --- Boilerplate trimming ---

    #[test]
    fn trim_drops_lines_before_first_h1() {
        let md = "Home > Guide > Intro\n[Edit this page](x)\n\n# Intro\n\nBody text\n";
        assert_eq!(trim_boilerplate(md), "# Intro\n\nBody text\n");
    }

    #[test]
    fn trim_without_h1_is_identity() {
        let md = "## Only a subsection\n\ntext\n";
        assert_eq!(trim_boilerplate(md), md);
    }

    #[test]
    fn trim_ignores_hash_lines_in_code_fences() {
        let md = "Breadcrumbs\n```bash\n# install deps\nnpm i\n```\n# Real Title\nBody\n";
        assert_eq!(trim_boilerplate(md), "# Real Title\nBody\n");
    }

    #[test]
    fn trim_keeps_later_h1s() {
        let md = "nav\n# First\ntext\n# Second\n";
        assert_eq!(trim_boilerplate(md), "# First\ntext\n# Second\n");
    }

    #[test]
    fn trim_does_not_treat_h2_as_top_level() {
        let md = "## Sub\n# Top\n";
        assert_eq!(trim_boilerplate(md), "# Top\n");
    }

    #[test]
    fn extracted_page_round_trip_starts_at_heading() {
        let page = r#"<html><body><main>
            <p>Docs / Guide / Setup</p>
            <h1>Setup</h1>
            <p>Install the tool.</p>
        </main></body></html>"#;

        let fragment = main_fragment(page);
        let md = trim_boilerplate(&to_markdown(&fragment, None).unwrap());
        assert!(md.starts_with("# Setup"), "got: {md}");
        assert!(md.contains("Install the tool."));
        assert!(!md.contains("Docs / Guide"));
    }

    /// Inner markup of `<main>`.
    fn main_fragment(page: &str) -> String {
        let doc = Html::parse_document(page);
        let sel = scraper::Selector::parse("main").unwrap();
        doc.select(&sel).next().unwrap().inner_html()
    }

    // --- Titles ---

    #[test]
    fn extract_title_from_first_h1() {
        assert_eq!(
            extract_title("intro\n# Getting Started\n## Next\n# Other"),
            Some("Getting Started".to_string())
        );
        assert_eq!(extract_title("## none"), None);
    }
}
