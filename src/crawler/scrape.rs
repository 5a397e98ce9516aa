use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use log2::debug;
use once_cell::sync::Lazy;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::{CrawlTarget, CrawlerConfig};
use super::normalize::{canonical_url, normalize_link};

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

/// How a single page request ended.
///
/// `T` is what a successful HTML fetch carries: the page straight out of the
/// fetch gate, or the scraped page with its links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Html(T),
    NonHtml,
    NotFound,
    OtherError(String),
    Timeout,
    /// The run was cancelled while the request was in flight
    Cancelled,
}

/// Body of an HTML response and the URL it was served from after redirects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlPage {
    pub url: Url,
    pub body: String,
}

/// A scraped HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedPage {
    /// Dedup key of the URL the page was served from, if redirects kept it on site
    pub final_url: Option<Url>,
    pub links: Vec<Url>,
}

pub type FetchOutcome = Outcome<HtmlPage>;
pub type PageOutcome = Outcome<ScrapedPage>;

impl<T> Outcome<T> {
    pub fn map_html<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Html(body) => Outcome::Html(f(body)),
            Outcome::NonHtml => Outcome::NonHtml,
            Outcome::NotFound => Outcome::NotFound,
            Outcome::OtherError(reason) => Outcome::OtherError(reason),
            Outcome::Timeout => Outcome::Timeout,
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Html(_) => "html",
            Outcome::NonHtml => "non_html",
            Outcome::NotFound => "not_found",
            Outcome::OtherError(_) => "other_error",
            Outcome::Timeout => "timeout",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Builds the client shared by every crawler of a run
pub fn build_client(config: &CrawlerConfig) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}

/// One GET bounded by `timeout`, classified on the final response after
/// redirects. Never retries.
pub async fn fetch_page(
    client: &Client,
    url: &Url,
    timeout: Duration,
    cancel: &CancellationToken,
) -> FetchOutcome {
    tokio::select! {
        _ = cancel.cancelled() => Outcome::Cancelled,
        outcome = request_page(client, url, timeout) => outcome,
    }
}

async fn request_page(client: &Client, url: &Url, timeout: Duration) -> FetchOutcome {
    let response = match client.get(url.clone()).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(e),
    };

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Outcome::NotFound;
    }
    if !status.is_success() {
        return Outcome::OtherError(format!("HTTP {}", status.as_u16()));
    }

    if !is_html(&response) {
        return Outcome::NonHtml;
    }

    let final_url = response.url().clone();
    match response.text().await {
        Ok(body) => Outcome::Html(HtmlPage { url: final_url, body }),
        Err(e) => classify_error(e),
    }
}

fn classify_error(error: reqwest::Error) -> FetchOutcome {
    if error.is_timeout() {
        Outcome::Timeout
    } else {
        Outcome::OtherError(error.to_string())
    }
}

fn is_html(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            let mime = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
            mime == "text/html" || mime == "application/xhtml+xml"
        })
        .unwrap_or(false)
}

/// Raw `href` values of every anchor, in document order
pub fn extract_links(document: &Html) -> impl Iterator<Item = &str> {
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
}

/// Parses `body` and returns the followable links it contains, normalized and
/// in document order. Duplicates are left to the caller.
pub fn collect_links(body: &str, page_url: &Url, target: &CrawlTarget, config: &CrawlerConfig) -> Vec<Url> {
    let document = Html::parse_document(body);
    extract_links(&document)
        .filter_map(|href| {
            let link = normalize_link(href, page_url, target, config.query_policy, &config.link_filter);
            if link.is_none() {
                debug!("Skipped link {:?} on {}", href, page_url);
            }
            link
        })
        .collect()
}

/// Runs `parse` for `page_url`, turning a panic into an error for that page
/// only.
pub fn parse_isolated(page_url: &Url, parse: impl FnOnce() -> Vec<Url>) -> Outcome<Vec<Url>> {
    match panic::catch_unwind(AssertUnwindSafe(parse)) {
        Ok(links) => Outcome::Html(links),
        Err(_) => Outcome::OtherError(format!("failed to parse {}", page_url)),
    }
}

/// Fetches one page of `target` and turns an HTML body into its links.
pub async fn scrape_page(
    url: &Url,
    client: &Client,
    target: &CrawlTarget,
    config: &CrawlerConfig,
    cancel: &CancellationToken,
) -> PageOutcome {
    match fetch_page(client, url, config.request_timeout, cancel).await {
        Outcome::Html(page) => {
            let final_url = canonical_url(page.url.clone(), target, config.query_policy);
            parse_isolated(url, || collect_links(&page.body, &page.url, target, config))
                .map_html(|links| ScrapedPage { final_url, links })
        }
        other => other.map_html(|_| ScrapedPage { final_url: None, links: Vec::new() }),
    }
}
