//! Cleanup passes applied to raw `htmd` output.
//!
//! Every pass leaves the body of fenced code blocks untouched.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// Run every cleanup pass in order.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let md = map_prose_lines(md, strip_wrapper_tags);
    let md = demote_extra_titles(&md);
    let md = fix_fence_languages(&md);
    let md = map_prose_lines(&md, |line| resolve_links(line, base_url));
    let md = map_prose_lines(&md, |line| line.trim_end().to_string());
    let md = collapse_blank_runs(&md);
    finish(&md)
}

/// Whether `line` opens or closes a fenced code block.
pub(crate) fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

/// Apply `f` to every line outside fenced code blocks.
fn map_prose_lines(md: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut in_fence = false;
    md.lines()
        .map(|line| {
            if is_fence(line) {
                in_fence = !in_fence;
                line.to_string()
            } else if in_fence {
                line.to_string()
            } else {
                f(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Layout wrappers `htmd` passes through verbatim. Their text is kept.
fn strip_wrapper_tags(line: &str) -> String {
    static WRAPPER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|aside|header|footer|main|figure|figcaption|details|summary)(?:\s[^>]*)?>",
        )
        .expect("valid regex")
    });

    WRAPPER_RE.replace_all(line, "").into_owned()
}

// ---------------------------------------------------------------------------
// Headings
// ---------------------------------------------------------------------------

/// Keep the first `# ` heading and turn later ones into `## `.
///
/// Headings inside code fences are left alone.
fn demote_extra_titles(md: &str) -> String {
    let mut seen_title = false;
    map_prose_lines(md, |line| {
        let Some(text) = line.strip_prefix("# ") else {
            return line.to_string();
        };
        if seen_title {
            format!("## {text}")
        } else {
            seen_title = true;
            line.to_string()
        }
    })
}

// ---------------------------------------------------------------------------
// Code fences
// ---------------------------------------------------------------------------

/// `language-rust`, `lang-rust` and `highlight-rust` info strings become `rust`.
fn fix_fence_languages(md: &str) -> String {
    static LANG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^(\s*(?:```|~~~))(?:language-|lang-|highlight-)([\w+#.-]+)")
            .expect("valid regex")
    });

    LANG_RE.replace_all(md, "$1$2").into_owned()
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Make relative link targets absolute against the page URL.
///
/// Images, anchors, and links that already carry a scheme are untouched.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)((?:\s+[^)]*)?)\)").expect("valid regex")
    });

    let Some(base) = base_url else {
        return md.to_string();
    };

    LINK_RE
        .replace_all(md, |caps: &Captures| {
            let href = &caps[3];
            if !caps[1].is_empty() || href.starts_with('#') || has_scheme(href) {
                return caps[0].to_string();
            }
            match base.join(href) {
                Ok(resolved) => format!("[{}]({resolved}{})", &caps[2], &caps[4]),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn has_scheme(href: &str) -> bool {
    Url::parse(href).is_ok()
}

// ---------------------------------------------------------------------------
// Whitespace
// ---------------------------------------------------------------------------

/// At most two consecutive blank lines outside code fences.
fn collapse_blank_runs(md: &str) -> String {
    let mut in_fence = false;
    let mut blanks = 0;
    let mut kept = Vec::new();

    for line in md.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
        }
        if in_fence || !line.trim().is_empty() {
            blanks = 0;
        } else {
            blanks += 1;
            if blanks > 2 {
                continue;
            }
        }
        kept.push(line);
    }

    kept.join("\n")
}

/// No leading blank lines, exactly one trailing newline.
fn finish(md: &str) -> String {
    let body = md.trim_start_matches('\n').trim_end();
    if body.is_empty() {
        String::new()
    } else {
        format!("{body}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_tags_are_stripped_outside_fences() {
        let md = "<div class=\"admonition\">Heads up</div>\n```html\n<div>kept</div>\n```";
        let out = map_prose_lines(md, strip_wrapper_tags);
        assert_eq!(out, "Heads up\n```html\n<div>kept</div>\n```");
    }

    #[test]
    fn later_titles_are_demoted() {
        let md = "# Install\n\ntext\n\n# Configure\n\n## Options";
        assert_eq!(
            demote_extra_titles(md),
            "# Install\n\ntext\n\n## Configure\n\n## Options"
        );
    }

    #[test]
    fn shell_comments_in_fences_are_not_titles() {
        let md = "```sh\n# comment\n```\n# Title";
        assert_eq!(demote_extra_titles(md), md);
    }

    #[test]
    fn fence_language_prefixes() {
        assert_eq!(
            fix_fence_languages("```language-typescript\nlet a = 1;\n```"),
            "```typescript\nlet a = 1;\n```"
        );
        assert_eq!(fix_fence_languages("~~~lang-c++\n~~~"), "~~~c++\n~~~");
        assert_eq!(fix_fence_languages("```go\n```"), "```go\n```");
    }

    #[test]
    fn relative_links_resolve_against_page() {
        let base = Url::parse("https://docs.example.com/guide/intro").unwrap();
        assert_eq!(
            resolve_links("[Setup](setup) and [API](/api)", Some(&base)),
            "[Setup](https://docs.example.com/guide/setup) and [API](https://docs.example.com/api)"
        );
    }

    #[test]
    fn absolute_anchor_and_image_links_untouched() {
        let base = Url::parse("https://docs.example.com/guide/").unwrap();
        let md = "[x](https://other.dev/a) [y](#part) [z](mailto:a@b.c) ![logo](img/logo.png)";
        assert_eq!(resolve_links(md, Some(&base)), md);
    }

    #[test]
    fn link_titles_survive_resolution() {
        let base = Url::parse("https://docs.example.com/guide/").unwrap();
        assert_eq!(
            resolve_links(r#"[Next](next "Next page")"#, Some(&base)),
            r#"[Next](https://docs.example.com/guide/next "Next page")"#
        );
    }

    #[test]
    fn no_base_leaves_links_alone() {
        assert_eq!(resolve_links("[a](b)", None), "[a](b)");
    }

    #[test]
    fn whitespace_passes() {
        assert_eq!(collapse_blank_runs("a\n\n\n\n\n\nb"), "a\n\n\nb");
        assert_eq!(collapse_blank_runs("a\n \n\t\n\n\nb"), "a\n \n\t\nb");
        assert_eq!(collapse_blank_runs("a\n\nb"), "a\n\nb");
        assert_eq!(finish("\n\nbody\n\n\n"), "body\n");
        assert_eq!(finish("\n \n"), "");
    }

    #[test]
    fn fenced_code_is_left_verbatim() {
        let raw = "# Indexing\n\n```\nlet v = arr[i](x);  \n[a](b)\n\n\n\n\nend\n```\n\n[a](b)\n";
        let base = Url::parse("https://docs.example.com/guide/").unwrap();
        let out = run_pipeline(raw, Some(&base));

        assert!(
            out.contains("```\nlet v = arr[i](x);  \n[a](b)\n\n\n\n\nend\n```"),
            "got: {out}"
        );
        assert!(out.ends_with("[a](https://docs.example.com/guide/b)\n"));
    }

    #[test]
    fn blank_runs_inside_fences_survive() {
        let md = "a\n\n\n\n```\n\n\n\n\n```\n\n\n\nb";
        assert_eq!(
            collapse_blank_runs(md),
            "a\n\n\n```\n\n\n\n\n```\n\n\nb"
        );
    }

    #[test]
    fn pipeline_end_to_end() {
        let raw = "\n<section>\n# Guide\n\n\n\n\n<span>Read</span> [more](more)   \n\n```language-python\nprint('hi')\n```\n";
        let base = Url::parse("https://example.com/docs/").unwrap();
        let out = run_pipeline(raw, Some(&base));

        assert!(out.starts_with("# Guide"));
        assert!(!out.contains("<span>"));
        assert!(!out.contains("\n\n\n\n"));
        assert!(out.contains("[more](https://example.com/docs/more)"));
        assert!(out.contains("```python"));
        assert!(out.ends_with("```\n"));
    }
}
