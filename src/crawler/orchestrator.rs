use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use log2::*;
use tokio_util::sync::CancellationToken;

use super::config::{CrawlTarget, CrawlerConfigRef};
use super::runner::SiteCrawler;
use super::scrape::build_client;
use crate::report::{CrawlReport, SiteCrawlResult};

/// Crawls every target concurrently and merges the results.
///
/// Each domain runs in its own task with its own frontier, so a slow or dead
/// site only costs its own time. The only error is failing to set up the run.
pub async fn crawl_all(
    targets: Vec<CrawlTarget>,
    config: CrawlerConfigRef,
    cancel: CancellationToken,
) -> Result<CrawlReport> {
    let started_at = Utc::now();
    let started = Instant::now();
    let client = build_client(&config).context("Failed to build HTTP client")?;

    let limit = config.max_concurrent_sites.unwrap_or(targets.len()).max(1);
    info!("Starting crawl of {} site(s), {} at a time", targets.len(), limit);

    let tasks = targets.into_iter().enumerate().map(|(index, target)| {
        let client = client.clone();
        let config = Arc::clone(&config);
        let cancel = cancel.clone();
        async move {
            let domain = target.domain.clone();
            let crawler = SiteCrawler::new(target, client, config);
            let result = match tokio::spawn(crawler.run(cancel)).await {
                Ok(result) => result,
                Err(e) => {
                    error!("{}: crawl task failed: {}", domain, e);
                    SiteCrawlResult::empty(domain)
                }
            };
            (index, result)
        }
    });

    let mut finished: Vec<(usize, SiteCrawlResult)> = stream::iter(tasks)
        .buffer_unordered(limit)
        .inspect(|(_, site)| {
            info!(
                "{}: done, {} pages checked, {} 404s, {} broken links in {:.1}s",
                site.domain,
                site.total_checked,
                site.total_404,
                site.broken_links.len(),
                site.duration_secs
            );
        })
        .collect()
        .await;

    finished.sort_by_key(|(index, _)| *index);
    let sites = finished.into_iter().map(|(_, site)| site).collect();

    let report = CrawlReport::new(started_at, started.elapsed().as_secs_f64(), sites);
    info!(
        "Crawl finished: {} pages, {} 404s across {} site(s)",
        report.summary.total_pages, report.summary.total_errors, report.summary.sites
    );
    Ok(report)
}
