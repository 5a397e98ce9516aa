pub mod config;
pub mod normalize;
pub mod orchestrator;
pub mod runner;
pub mod scrape;
pub mod state;


pub use config::{
    CrawlTarget, CrawlerConfig, CrawlerConfigRef, LinkFilter, MAX_ERRORS_LISTED, MAX_PAGES_PER_SITE,
    PAGE_REQUEST_TIMEOUT_SEC, QueryPolicy,
};
pub use normalize::{canonical_url, display_path, normalize_link};
pub use orchestrator::crawl_all;
pub use runner::SiteCrawler;
pub use scrape::{
    FetchOutcome, HtmlPage, Outcome, PageOutcome, ScrapedPage, build_client, extract_links, fetch_page, parse_isolated,
    scrape_page,
};
pub use state::CrawlerState;
