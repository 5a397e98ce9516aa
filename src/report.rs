use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::crawler::normalize::display_path;

/// A same-site link whose target came back 404, with the page it sits on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenLink {
    pub source: String,
    pub target: String,
}

impl BrokenLink {
    pub fn new(source: &Url, target: &Url) -> Self {
        Self {
            source: display_path(source),
            target: display_path(target),
        }
    }
}

/// Outcome of crawling one domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteCrawlResult {
    pub domain: String,
    /// Every fetch attempted, whatever its outcome
    pub total_checked: usize,
    /// Paths that returned 404, truncated for display
    pub errors_404: Vec<String>,
    /// Number of 404 pages, not truncated
    pub total_404: usize,
    pub broken_links: Vec<BrokenLink>,
    pub duration_secs: f64,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled: bool,
}

impl SiteCrawlResult {
    /// Result for a domain whose crawl never produced anything
    pub fn empty(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            total_checked: 0,
            errors_404: Vec::new(),
            total_404: 0,
            broken_links: Vec::new(),
            duration_secs: 0.0,
            completed_at: Utc::now(),
            cancelled: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub sites: usize,
    pub total_pages: usize,
    pub total_errors: usize,
    pub total_broken_links: usize,
}

impl CrawlSummary {
    pub fn from_sites(sites: &[SiteCrawlResult]) -> Self {
        sites.iter().fold(Self::default(), |acc, site| Self {
            sites: acc.sites + 1,
            total_pages: acc.total_pages + site.total_checked,
            total_errors: acc.total_errors + site.total_404,
            total_broken_links: acc.total_broken_links + site.broken_links.len(),
        })
    }
}

/// Everything one run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub sites: Vec<SiteCrawlResult>,
    pub summary: CrawlSummary,
    #[serde(default)]
    pub cancelled: bool,
}

impl CrawlReport {
    pub fn new(started_at: DateTime<Utc>, duration_secs: f64, sites: Vec<SiteCrawlResult>) -> Self {
        let summary = CrawlSummary::from_sites(&sites);
        let cancelled = sites.iter().any(|site| site.cancelled);
        Self {
            started_at,
            duration_secs,
            sites,
            summary,
            cancelled,
        }
    }

    pub fn site(&self, domain: &str) -> Option<&SiteCrawlResult> {
        self.sites.iter().find(|site| site.domain == domain)
    }

    pub fn print_table(&self) {
        println!("{:<40} {:>8} {:>8} {:>8} {:>10}", "DOMAIN", "PAGES", "404s", "BROKEN", "SECONDS");
        println!("{}", "=".repeat(78));
        for site in &self.sites {
            println!(
                "{:<40} {:>8} {:>8} {:>8} {:>10.1}",
                site.domain,
                site.total_checked,
                site.total_404,
                site.broken_links.len(),
                site.duration_secs
            );
        }
        println!();

        for site in self.sites.iter().filter(|site| !site.errors_404.is_empty()) {
            println!("{}:", site.domain);
            for path in &site.errors_404 {
                println!("  404 {}", path);
            }
            if site.total_404 > site.errors_404.len() {
                println!("  ... and {} more", site.total_404 - site.errors_404.len());
            }
            for link in &site.broken_links {
                println!("  {} -> {}", link.source, link.target);
            }
        }

        println!("Summary:");
        println!("  Sites: {}", self.summary.sites);
        println!("  Pages checked: {}", self.summary.total_pages);
        println!("  404 pages: {}", self.summary.total_errors);
        println!("  Broken links: {}", self.summary.total_broken_links);
    }
}
