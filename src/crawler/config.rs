use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default timeout for a single page request in seconds
pub const PAGE_REQUEST_TIMEOUT_SEC: u64 = 8;
/// Default number of pages fetched per domain before the crawl stops
pub const MAX_PAGES_PER_SITE: usize = 150;
/// Default number of 404 paths kept in a site result
pub const MAX_ERRORS_LISTED: usize = 50;

const NON_CONTENT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "tif", "tiff", "pdf", "zip",
    "rar", "gz", "tgz", "tar", "7z", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv", "mp3",
    "mp4", "avi", "mov", "webm", "css", "js", "json", "woff", "woff2", "ttf", "eot",
];

const NON_CONTENT_PREFIXES: &[&str] = &[
    "/wp-admin",
    "/wp-content",
    "/wp-includes",
    "/wp-json",
    "/admin",
    "/assets",
    "/static",
    "/cdn-cgi",
];

/// What happens to the query string of a discovered link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryPolicy {
    /// `/page?a=1` and `/page?a=2` are the same page
    Strip,
    /// The query selects distinct content and is part of the key
    Keep,
}

/// Rules deciding which same-domain paths are worth fetching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkFilter {
    /// Lowercase file extensions without the dot
    pub extensions: Vec<String>,
    /// Path prefixes, matched on whole path segments
    pub prefixes: Vec<String>,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self {
            extensions: NON_CONTENT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            prefixes: NON_CONTENT_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LinkFilter {
    /// Filter that rejects nothing
    pub fn empty() -> Self {
        Self { extensions: Vec::new(), prefixes: Vec::new() }
    }

    /// True if `path` points at an asset or an admin area rather than a page
    pub fn rejects(&self, path: &str) -> bool {
        let lowered = path.to_ascii_lowercase();

        let last_segment = lowered.rsplit('/').next().unwrap_or_default();
        if let Some((_, ext)) = last_segment.rsplit_once('.') {
            if self.extensions.iter().any(|e| e == ext) {
                return true;
            }
        }

        self.prefixes.iter().any(|prefix| {
            lowered == *prefix
                || lowered
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// One configured site.
///
/// A bare hostname is crawled over https; an explicit base URL keeps its scheme
/// and port, which is how local servers are targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTarget {
    pub domain: String,
    pub root: Url,
}

impl CrawlTarget {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("empty domain");
        }

        let candidate = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };

        let mut root = Url::parse(&candidate).map_err(|e| anyhow!("Invalid domain '{}': {}", input, e))?;
        if !matches!(root.scheme(), "http" | "https") {
            bail!("Unsupported scheme for '{}'", input);
        }
        let domain = root
            .host_str()
            .ok_or_else(|| anyhow!("Domain has no host: {}", input))?
            .to_string();

        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);

        Ok(Self { domain, root })
    }

    /// Same host as the root. The port only counts when the target was
    /// configured with an explicit one, so `http://` and `https://` links to
    /// a bare domain are both on site.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        let same_host = url
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.domain));
        match self.root.port() {
            Some(port) => same_host && url.port_or_known_default() == Some(port),
            None => same_host,
        }
    }
}

/// Crawl policy shared by every site crawler of a run
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub request_timeout: Duration,
    pub max_pages: usize,
    pub max_errors_listed: usize,
    pub query_policy: QueryPolicy,
    pub link_filter: LinkFilter,
    /// `None` runs every site at once
    pub max_concurrent_sites: Option<usize>,
    pub user_agent: String,
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self {
            request_timeout: Duration::from_secs(PAGE_REQUEST_TIMEOUT_SEC),
            max_pages: MAX_PAGES_PER_SITE,
            max_errors_listed: MAX_ERRORS_LISTED,
            query_policy: QueryPolicy::Strip,
            link_filter: LinkFilter::default(),
            max_concurrent_sites: None,
            user_agent: format!("site-health/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_errors_listed(mut self, max_errors_listed: usize) -> Self {
        self.max_errors_listed = max_errors_listed;
        self
    }

    pub fn with_query_policy(mut self, policy: QueryPolicy) -> Self {
        self.query_policy = policy;
        self
    }

    pub fn with_link_filter(mut self, filter: LinkFilter) -> Self {
        self.link_filter = filter;
        self
    }

    pub fn with_max_concurrent_sites(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent_sites = limit;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub type CrawlerConfigRef = Arc<CrawlerConfig>;
