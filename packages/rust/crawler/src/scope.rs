//! URL normalization and crawl scope checks.
//!
//! A crawl is confined to the seed's host and the seed's first path segment.
//! `https://docs.example.com/guide/intro` scopes the crawl to
//! `docs.example.com` + `/guide`.

use url::Url;

use docharvest_shared::{HarvestError, Result};

// ---------------------------------------------------------------------------
// NormalizedUrl
// ---------------------------------------------------------------------------

/// A URL with its fragment and trailing `/` removed.
///
/// Two URLs that normalize equal are the same page for deduplication.
/// The string form is the dedup key; [`NormalizedUrl::to_url`] reparses it
/// for fetching (which may reintroduce a `/` root path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl(String);

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the normalized form back into a [`Url`].
    pub fn to_url(&self) -> Result<Url> {
        Url::parse(&self.0).map_err(|e| HarvestError::invalid_url(&self.0, e))
    }
}

impl std::fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a URL string: strip the fragment and a trailing `/` from the path,
/// keep scheme, host, port, path, and query.
pub fn normalize(url: &str) -> Result<NormalizedUrl> {
    let parsed = Url::parse(url).map_err(|e| HarvestError::invalid_url(url, e))?;
    normalize_parsed(&parsed)
}

/// Normalize an already-parsed URL.
fn normalize_parsed(url: &Url) -> Result<NormalizedUrl> {
    let Some(host) = url.host_str().filter(|_| !url.cannot_be_a_base()) else {
        return Err(HarvestError::invalid_url(url.as_str(), "URL has no host"));
    };

    let mut normalized = format!("{}://{host}", url.scheme());
    if let Some(port) = url.port() {
        normalized.push_str(&format!(":{port}"));
    }

    let path = url.path();
    normalized.push_str(path.strip_suffix('/').unwrap_or(path));
    if let Some(query) = url.query() {
        normalized.push('?');
        normalized.push_str(query);
    }

    Ok(NormalizedUrl(normalized))
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// The (host, path-prefix) pair that bounds a crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// Hostname of the seed.
    pub host: String,
    /// First path segment of the seed; empty when the seed has no path.
    pub path_prefix: String,
}

/// Derive the crawl scope from a seed URL.
pub fn scope_of(seed: &str) -> Result<Scope> {
    let parsed = Url::parse(seed).map_err(|e| HarvestError::invalid_url(seed, e))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| HarvestError::invalid_url(seed, "URL has no host"))?
        .to_string();

    let path_prefix = parsed
        .path_segments()
        .and_then(|mut segments| segments.next())
        .unwrap_or("")
        .to_string();

    Ok(Scope { host, path_prefix })
}

/// Whether `candidate` belongs to `scope`: same host, and a path starting with
/// `/` + prefix. Malformed candidates are simply out of scope.
pub fn in_scope(candidate: &str, scope: &Scope) -> bool {
    match Url::parse(candidate) {
        Ok(url) => in_scope_parsed(&url, scope),
        Err(_) => false,
    }
}

/// [`in_scope`] for an already-parsed URL.
fn in_scope_parsed(url: &Url, scope: &Scope) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    if host != scope.host {
        return false;
    }
    url.path().starts_with(&format!("/{}", scope.path_prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guide_scope() -> Scope {
        scope_of("https://docs.example.com/guide/intro").unwrap()
    }

    #[test]
    fn normalize_strips_fragment_and_trailing_slash() {
        let n = normalize("https://docs.example.com/guide/intro/#section-1").unwrap();
        assert_eq!(n.as_str(), "https://docs.example.com/guide/intro");
    }

    #[test]
    fn normalize_keeps_query() {
        let n = normalize("https://docs.example.com/search/?q=rust#top").unwrap();
        assert_eq!(n.as_str(), "https://docs.example.com/search?q=rust");
    }

    #[test]
    fn normalize_root_and_port() {
        let n = normalize("http://127.0.0.1:8080/").unwrap();
        assert_eq!(n.as_str(), "http://127.0.0.1:8080");
        assert_eq!(n.to_url().unwrap().as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn normalize_lowercases_host() {
        let a = normalize("https://Docs.Example.com/guide").unwrap();
        let b = normalize("https://docs.example.com/guide/").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn normalize_rejects_relative_and_hostless() {
        assert!(matches!(
            normalize("/guide/intro"),
            Err(HarvestError::InvalidUrl { .. })
        ));
        assert!(normalize("mailto:docs@example.com").is_err());
        assert!(normalize("not a url").is_err());
    }

    #[test]
    fn scope_of_seed() {
        let scope = guide_scope();
        assert_eq!(scope.host, "docs.example.com");
        assert_eq!(scope.path_prefix, "guide");
    }

    #[test]
    fn scope_of_root_seed_has_empty_prefix() {
        let scope = scope_of("https://docs.example.com/").unwrap();
        assert_eq!(scope.path_prefix, "");
        let scope = scope_of("https://docs.example.com").unwrap();
        assert_eq!(scope.path_prefix, "");
    }

    #[test]
    fn in_scope_is_reflexive_for_seed() {
        let seed = "https://docs.example.com/guide/intro";
        assert!(in_scope(seed, &scope_of(seed).unwrap()));

        let normalized = normalize("https://docs.example.com/").unwrap();
        assert!(in_scope(normalized.as_str(), &scope_of("https://docs.example.com/").unwrap()));
    }

    #[test]
    fn in_scope_same_section() {
        let scope = guide_scope();
        assert!(in_scope("https://docs.example.com/guide/setup", &scope));
        assert!(!in_scope("https://docs.example.com/blog/post", &scope));
        assert!(!in_scope("https://other.com/guide/intro", &scope));
    }

    #[test]
    fn in_scope_rejects_other_hosts_even_with_empty_prefix() {
        let scope = scope_of("https://docs.example.com").unwrap();
        assert!(in_scope("https://docs.example.com/anything/at/all", &scope));
        assert!(!in_scope("https://cdn.example.com/anything", &scope));
    }

    #[test]
    fn in_scope_prefix_match_is_coarse() {
        // A single segment prefix also admits siblings sharing the prefix.
        let scope = guide_scope();
        assert!(in_scope("https://docs.example.com/guidelines", &scope));
    }

    #[test]
    fn malformed_candidates_are_out_of_scope() {
        let scope = guide_scope();
        assert!(!in_scope("::::", &scope));
        assert!(!in_scope("/guide/relative", &scope));
        assert!(!in_scope("mailto:team@docs.example.com", &scope));
    }
}
