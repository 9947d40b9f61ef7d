//! Aggregation and download packaging.
//!
//! A finished task's pages become either one Markdown document or a zip
//! archive. Archives come in two layouts: a tree that mirrors the crawled
//! paths below the seed, and a flat list of numbered files in crawl order.
//! Both carry a `README.md` index.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use url::Url;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use docharvest_shared::{
    CrawlOutput, ExportFormat, HarvestError, OutputOptions, PageResult, Result, TaskId, TaskState,
};

use crate::task::TaskReport;

/// Delimiter placed between page bodies in the aggregated document.
pub const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Base filename used when neither the caller nor the seed provides one.
pub const DEFAULT_BASENAME: &str = "documentation";

const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";
const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Index entry written at the root of every archive.
const README_NAME: &str = "README.md";

/// A packaged deliverable ready to be written or served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Join the bodies of all successful, non-blank pages in processing order.
///
/// Failed pages contribute nothing.
pub fn aggregate(pages: &[PageResult]) -> String {
    let bodies: Vec<&str> = contributing(pages).map(|p| p.markdown.trim_end()).collect();
    if bodies.is_empty() {
        return String::new();
    }
    let mut content = bodies.join(PAGE_SEPARATOR);
    content.push('\n');
    content
}

/// Build the `result` payload for a terminal task.
pub fn crawl_output(task_id: TaskId, state: TaskState, report: &TaskReport) -> CrawlOutput {
    CrawlOutput {
        task_id,
        source_url: report.seed_url.clone(),
        content: aggregate(&report.pages),
        pages: contributing(&report.pages).count(),
        failed_pages: report.pages.iter().filter(|p| !p.success).count(),
        state,
        generated_at: report.finished_at,
    }
}

fn contributing(pages: &[PageResult]) -> impl Iterator<Item = &PageResult> {
    pages
        .iter()
        .filter(|p| p.success && !p.markdown.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Packaging
// ---------------------------------------------------------------------------

/// Package a task's output in the requested format.
#[instrument(skip_all, fields(format = %options.format, source = %output.source_url))]
pub fn package(
    output: &CrawlOutput,
    pages: &[PageResult],
    options: &OutputOptions,
) -> Result<Download> {
    let base = base_filename(&output.source_url, options.filename.as_deref());

    let download = if options.format.is_archive() {
        let included: Vec<&PageResult> = contributing(pages).collect();
        let names = match options.format {
            ExportFormat::ZipFlat => flat_names(&included),
            _ => tree_paths(&output.source_url, &included),
        };
        let entries: Vec<(String, &PageResult)> = names.into_iter().zip(included).collect();
        let readme = readme(output, &entries, pages);

        Download {
            filename: format!("{base}.zip"),
            content_type: ZIP_CONTENT_TYPE,
            bytes: write_archive(&readme, &entries)?,
        }
    } else {
        Download {
            filename: format!("{base}.md"),
            content_type: MARKDOWN_CONTENT_TYPE,
            bytes: output.content.clone().into_bytes(),
        }
    };

    debug!(filename = %download.filename, bytes = download.bytes.len(), "download packaged");
    Ok(download)
}

fn write_archive(readme: &str, entries: &[(String, &PageResult)]) -> Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let files = std::iter::once((README_NAME, readme))
        .chain(entries.iter().map(|(name, page)| (name.as_str(), page.markdown.as_str())));

    for (name, body) in files {
        writer
            .start_file(name, options)
            .map_err(|e| HarvestError::Archive(format!("failed to add {name}: {e}")))?;
        writer
            .write_all(body.as_bytes())
            .map_err(|e| HarvestError::Archive(format!("failed to write {name}: {e}")))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| HarvestError::Archive(format!("failed to finish archive: {e}")))?;
    Ok(cursor.into_inner())
}

fn readme(output: &CrawlOutput, entries: &[(String, &PageResult)], pages: &[PageResult]) -> String {
    let mut md = String::from("# Documentation export\n\n");
    md.push_str(&format!("- Source: {}\n", output.source_url));
    md.push_str(&format!("- Generated: {}\n", format_timestamp(output.generated_at)));
    md.push_str(&format!("- Pages: {}\n", entries.len()));
    if output.state != TaskState::Completed {
        md.push_str("- Status: incomplete (crawl stopped early)\n");
    }

    md.push_str("\n## Pages\n\n");
    for (name, page) in entries {
        let label = page.title.as_deref().unwrap_or(&page.url);
        md.push_str(&format!("- [{label}]({name}) ({})\n", page.url));
    }

    let failed: Vec<&PageResult> = pages.iter().filter(|p| !p.success).collect();
    if !failed.is_empty() {
        md.push_str("\n## Failed pages\n\n");
        for page in failed {
            md.push_str(&format!("- {}\n", page.url));
        }
    }

    md
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Base filename (no extension) for a download.
///
/// A caller-supplied name wins; otherwise the seed's last non-empty path
/// segment; otherwise [`DEFAULT_BASENAME`].
pub fn base_filename(seed_url: &str, requested: Option<&str>) -> String {
    let from_request = requested
        .map(|name| {
            let name = name.trim();
            let name = name
                .strip_suffix(".md")
                .or_else(|| name.strip_suffix(".zip"))
                .unwrap_or(name);
            sanitize_filename(name)
        })
        .filter(|name| !name.is_empty());

    from_request
        .or_else(|| {
            last_segment(seed_url)
                .map(|seg| sanitize_filename(&seg))
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_BASENAME.to_string())
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`; no leading dots.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

fn last_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

/// Archive paths mirroring each page's location below the seed path.
///
/// Pages outside the seed path keep their full path. Names are compared
/// case-insensitively; collisions, including with the archive's `README.md`,
/// get `-2`, `-3`, ... suffixes.
pub fn tree_paths(seed_url: &str, pages: &[&PageResult]) -> Vec<String> {
    let seed_path = Url::parse(seed_url)
        .map(|u| u.path().trim_end_matches('/').to_string())
        .unwrap_or_default();

    let mut used = HashSet::from([README_NAME.to_ascii_lowercase()]);
    pages
        .iter()
        .map(|page| {
            let path = Url::parse(&page.url)
                .map(|u| u.path().to_string())
                .unwrap_or_default();
            let relative = relative_to(&path, &seed_path);
            unique_name(&sanitize_tree_path(relative), &mut used)
        })
        .collect()
}

fn relative_to<'a>(path: &'a str, seed_path: &str) -> &'a str {
    let path = path.trim_end_matches('/');
    if seed_path.is_empty() {
        return path;
    }
    if path == seed_path {
        return "";
    }
    match path.strip_prefix(seed_path) {
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Segments sanitized to `[A-Za-z0-9_-]` with `-` runs collapsed; `index` if empty.
fn sanitize_tree_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .map(sanitize_segment)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.is_empty() {
        "index".to_string()
    } else {
        segments.join("/")
    }
}

fn sanitize_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

fn unique_name(stem: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = format!("{stem}.md");
    let mut n = 2;
    while !used.insert(candidate.to_ascii_lowercase()) {
        candidate = format!("{stem}-{n}.md");
        n += 1;
    }
    candidate
}

/// `NNN_<last-segment>.md` names in processing order.
pub fn flat_names(pages: &[&PageResult]) -> Vec<String> {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| {
            let leaf = last_segment(&page.url)
                .map(|seg| sanitize_segment(&seg))
                .filter(|seg| !seg.is_empty())
                .unwrap_or_else(|| "index".to_string());
            format!("{:03}_{leaf}.md", i + 1)
        })
        .collect()
}
