use url::Url;

use super::config::{CrawlTarget, LinkFilter, QueryPolicy};

/// Resolves `href` against the page it was found on and reduces it to the key
/// used for deduplication.
///
/// Returns `None` for anything the crawler should not follow: unparsable
/// hrefs, non-http schemes, other hosts, and paths the `filter` rejects.
pub fn normalize_link(
    href: &str,
    page_url: &Url,
    target: &CrawlTarget,
    query_policy: QueryPolicy,
    filter: &LinkFilter,
) -> Option<Url> {
    let url = page_url.join(href.trim()).ok()?;
    let url = canonical_url(url, target, query_policy)?;

    if filter.rejects(url.path()) {
        return None;
    }

    Some(url)
}

/// Dedup key of an absolute URL of `target`, or `None` if it is off site.
///
/// Without an explicit port on the target, the scheme is rewritten to the
/// target's so `http://` and `https://` spellings of a page share one key.
pub fn canonical_url(mut url: Url, target: &CrawlTarget, query_policy: QueryPolicy) -> Option<Url> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if !target.is_same_origin(&url) {
        return None;
    }

    if target.root.port().is_none() && url.scheme() != target.root.scheme() {
        url.set_scheme(target.root.scheme()).ok()?;
    }
    url.set_fragment(None);
    if query_policy == QueryPolicy::Strip {
        url.set_query(None);
    }

    Some(url)
}

/// Path (plus query, when kept) used when reporting a URL of a crawled site
pub fn display_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
