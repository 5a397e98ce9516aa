use std::collections::{HashMap, HashSet, VecDeque};

use url::Url;

use super::normalize::display_path;
use crate::report::BrokenLink;

/// Bookkeeping of one site crawl. Owned by a single crawler, never shared.
#[derive(Debug, Default)]
pub struct CrawlerState {
    /// URLs waiting to be fetched, breadth-first
    pub frontier: VecDeque<Url>,
    /// Mirror of `frontier` for membership tests
    pub queued: HashSet<Url>,
    /// URLs already dequeued and fetched
    pub visited: HashSet<Url>,
    /// Target URL -> pages that link to it, in discovery order
    pub referrers: HashMap<Url, Vec<Url>>,
    /// URLs whose fetch came back 404
    pub not_found: HashSet<Url>,
    pub pages_checked: usize,
    pub errors_404: Vec<String>,
    pub total_404: usize,
    pub broken_links: Vec<BrokenLink>,
}

impl CrawlerState {
    pub fn new(root: Url) -> Self {
        let mut state = Self::default();
        state.enqueue(root);
        state
    }

    /// Adds `url` to the frontier unless it was already fetched or queued
    pub fn enqueue(&mut self, url: Url) -> bool {
        if self.visited.contains(&url) || self.queued.contains(&url) {
            return false;
        }
        self.queued.insert(url.clone());
        self.frontier.push_back(url);
        true
    }

    /// Next URL that has not been fetched yet, marked as visited
    pub fn next_unvisited(&mut self) -> Option<Url> {
        while let Some(url) = self.frontier.pop_front() {
            self.queued.remove(&url);
            if self.visited.insert(url.clone()) {
                return Some(url);
            }
        }
        None
    }

    /// Marks `url` as fetched without counting a page, e.g. the target of a
    /// redirect. A queued copy is dropped when it is dequeued.
    pub fn mark_visited(&mut self, url: Url) {
        self.visited.insert(url);
    }

    /// Records that `source` links to `target`.
    ///
    /// If `target` is already known to be missing the broken link is emitted
    /// right away, otherwise when its 404 is observed.
    pub fn add_reference(&mut self, source: &Url, target: &Url) {
        let sources = self.referrers.entry(target.clone()).or_default();
        if sources.contains(source) {
            return;
        }
        sources.push(source.clone());

        if self.not_found.contains(target) {
            self.broken_links.push(BrokenLink::new(source, target));
        }
    }

    /// Records a 404 for `url` and attributes it to every known referrer
    pub fn record_not_found(&mut self, url: &Url, max_errors_listed: usize) {
        if !self.not_found.insert(url.clone()) {
            return;
        }

        self.total_404 += 1;
        if self.errors_404.len() < max_errors_listed {
            self.errors_404.push(display_path(url));
        }

        if let Some(sources) = self.referrers.get(url) {
            self.broken_links
                .extend(sources.iter().map(|source| BrokenLink::new(source, url)));
        }
    }
}
