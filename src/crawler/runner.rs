use std::time::Instant;

use chrono::Utc;
use log2::*;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use super::config::{CrawlTarget, CrawlerConfigRef};
use super::normalize::display_path;
use super::scrape::{Outcome, scrape_page};
use super::state::CrawlerState;
use crate::report::SiteCrawlResult;

/// Breadth-first crawler for a single domain.
///
/// Created idle, consumed by [`SiteCrawler::run`], which fetches one page at a
/// time until the frontier is empty, the page cap is hit or the run is
/// cancelled.
pub struct SiteCrawler {
    target: CrawlTarget,
    client: Client,
    config: CrawlerConfigRef,
    state: CrawlerState,
}

impl SiteCrawler {
    pub fn new(target: CrawlTarget, client: Client, config: CrawlerConfigRef) -> Self {
        let state = CrawlerState::new(target.root.clone());
        Self { target, client, config, state }
    }

    pub async fn run(mut self, cancel: CancellationToken) -> SiteCrawlResult {
        let started = Instant::now();
        let mut cancelled = false;
        info!("Crawling {} from {}", self.target.domain, self.target.root);

        while self.state.pages_checked < self.config.max_pages {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let Some(url) = self.state.next_unvisited() else {
                break;
            };

            let outcome = scrape_page(&url, &self.client, &self.target, &self.config, &cancel).await;
            if matches!(outcome, Outcome::Cancelled) {
                cancelled = true;
                break;
            }

            self.state.pages_checked += 1;
            debug!("{}: {} -> {}", self.target.domain, display_path(&url), outcome.kind());

            match outcome {
                Outcome::NotFound => {
                    self.state.record_not_found(&url, self.config.max_errors_listed);
                }
                Outcome::Html(page) => {
                    if let Some(final_url) = page.final_url.filter(|u| *u != url) {
                        debug!("{}: {} redirected to {}", self.target.domain, url, final_url);
                        self.state.mark_visited(final_url);
                    }
                    for link in page.links {
                        self.state.add_reference(&url, &link);
                        self.state.enqueue(link);
                    }
                }
                Outcome::OtherError(reason) => {
                    debug!("{}: {} failed: {}", self.target.domain, url, reason);
                }
                Outcome::NonHtml | Outcome::Timeout | Outcome::Cancelled => {}
            }
        }

        if self.state.pages_checked >= self.config.max_pages && !self.state.frontier.is_empty() {
            info!(
                "{}: page cap of {} reached, {} URLs left unvisited",
                self.target.domain,
                self.config.max_pages,
                self.state.frontier.len()
            );
        }
        if cancelled {
            warn!("{}: crawl cancelled after {} pages", self.target.domain, self.state.pages_checked);
        }

        let state = self.state;
        SiteCrawlResult {
            domain: self.target.domain,
            total_checked: state.pages_checked,
            errors_404: state.errors_404,
            total_404: state.total_404,
            broken_links: state.broken_links,
            duration_secs: started.elapsed().as_secs_f64(),
            completed_at: Utc::now(),
            cancelled,
        }
    }
}
