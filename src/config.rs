use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, TimeDelta, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::crawler::{
    CrawlTarget, CrawlerConfig, MAX_ERRORS_LISTED, MAX_PAGES_PER_SITE, PAGE_REQUEST_TIMEOUT_SEC,
    QueryPolicy,
};

/// Longest evolution window accepted, about a century
pub const MAX_EVOLUTION_DAYS: i64 = 36_500;

/// Log levels as defined in log2 crate
#[derive(Debug, Serialize, Deserialize, Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Program arguments. `CrawlerConfig` only describes the crawl itself.
#[derive(Parser, Debug, Serialize, Deserialize)]
#[command(author, version, about = "Finds broken pages and dead links on a set of websites", long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,
    /// File the crawl history is appended to
    #[arg(long, global = true, default_value = "site-health-history.jsonl")]
    pub history_file: PathBuf,
    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", value_enum)]
    pub log_level: LogLevel,
}

#[derive(Subcommand, Debug, Serialize, Deserialize)]
pub enum Command {
    /// Crawl every configured domain once and record the run
    Crawl(CrawlArgs),
    /// Show how the error count evolved over recorded runs
    Evolution(EvolutionArgs),
}

#[derive(clap::Args, Debug, Serialize, Deserialize)]
pub struct CrawlArgs {
    /// Domain to crawl, e.g. `example.com` or `http://localhost:8080`
    #[arg(short, long = "domain", required = true)]
    pub domains: Vec<String>,
    /// Timeout of a single page request in seconds
    #[arg(long, default_value_t = PAGE_REQUEST_TIMEOUT_SEC)]
    pub timeout_secs: u64,
    /// Maximum number of pages fetched per domain
    #[arg(long, default_value_t = MAX_PAGES_PER_SITE)]
    pub max_pages: usize,
    /// Maximum number of 404 paths listed per domain
    #[arg(long, default_value_t = MAX_ERRORS_LISTED)]
    pub max_errors: usize,
    /// Treat URLs differing only in their query string as different pages
    #[arg(long)]
    pub keep_query: bool,
    /// Crawl at most this many domains at the same time
    #[arg(long)]
    pub max_concurrent_sites: Option<usize>,
    /// User-Agent header sent with every request
    #[arg(long)]
    pub user_agent: Option<String>,
    /// Output the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
    /// Don't append the run to the history file
    #[arg(long)]
    pub no_record: bool,
}

#[derive(clap::Args, Debug, Serialize, Deserialize)]
pub struct EvolutionArgs {
    /// How many days back to look
    #[arg(long, default_value = "30")]
    pub days: i64,
    /// One point per run instead of one per day
    #[arg(long)]
    pub per_run: bool,
    /// Output the series as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::parse()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match &self.command {
            Command::Crawl(args) => args.validate(),
            Command::Evolution(args) => args.validate(),
        }
    }
}

impl EvolutionArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.days <= 0 {
            anyhow::bail!("days must be greater than 0");
        }
        if self.days > MAX_EVOLUTION_DAYS {
            anyhow::bail!("days must be at most {}", MAX_EVOLUTION_DAYS);
        }
        Ok(())
    }

    /// `[now - days, now)`
    pub fn window(&self, now: DateTime<Utc>) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
        let from = TimeDelta::try_days(self.days)
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| anyhow!("{} days is out of range", self.days))?;
        Ok((from, now))
    }
}

impl CrawlArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.domains.is_empty() {
            anyhow::bail!("at least one domain is required");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than 0");
        }
        if self.max_pages == 0 {
            anyhow::bail!("max_pages must be greater than 0");
        }
        if self.max_concurrent_sites == Some(0) {
            anyhow::bail!("max_concurrent_sites must be greater than 0");
        }
        if self.user_agent.as_deref().is_some_and(|ua| ua.trim().is_empty()) {
            anyhow::bail!("user_agent must not be empty");
        }
        Ok(())
    }

    pub fn targets(&self) -> anyhow::Result<Vec<CrawlTarget>> {
        let mut targets: Vec<CrawlTarget> = Vec::new();
        for domain in &self.domains {
            let target = CrawlTarget::parse(domain)?;
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        Ok(targets)
    }

    pub fn crawler_config(&self) -> CrawlerConfig {
        let query_policy = if self.keep_query { QueryPolicy::Keep } else { QueryPolicy::Strip };
        let config = CrawlerConfig::new()
            .with_request_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_pages(self.max_pages)
            .with_max_errors_listed(self.max_errors)
            .with_query_policy(query_policy)
            .with_max_concurrent_sites(self.max_concurrent_sites);
        match &self.user_agent {
            Some(user_agent) => config.with_user_agent(user_agent.as_str()),
            None => config,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("site-health").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_crawl_defaults() {
        let cfg = parse(&["crawl", "-d", "example.com", "--domain", "shop.example.org"]);
        cfg.validate().unwrap();
        let Command::Crawl(args) = cfg.command else {
            panic!("expected crawl command");
        };
        assert_eq!(args.domains.len(), 2);

        let crawler = args.crawler_config();
        assert_eq!(crawler.request_timeout, Duration::from_secs(8));
        assert_eq!(crawler.max_pages, 150);
        assert_eq!(crawler.max_errors_listed, 50);
        assert_eq!(crawler.query_policy, QueryPolicy::Strip);
        assert_eq!(crawler.max_concurrent_sites, None);
        assert!(crawler.user_agent.starts_with("site-health/"));
    }

    #[test]
    fn test_custom_user_agent() {
        let cfg = parse(&["crawl", "-d", "example.com", "--user-agent", "health-bot/2.0"]);
        cfg.validate().unwrap();
        let Command::Crawl(args) = cfg.command else {
            panic!("expected crawl command");
        };
        assert_eq!(args.crawler_config().user_agent, "health-bot/2.0");

        let blank = parse(&["crawl", "-d", "example.com", "--user-agent", " "]);
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_duplicate_domains_collapsed() {
        let cfg = parse(&["crawl", "-d", "example.com", "-d", "example.com"]);
        let Command::Crawl(args) = cfg.command else {
            panic!("expected crawl command");
        };
        let targets = args.targets().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].root.as_str(), "https://example.com/");
    }

    #[test]
    fn test_zero_page_cap_rejected() {
        let cfg = parse(&["crawl", "-d", "example.com", "--max-pages", "0"]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_domain_required() {
        assert!(Config::try_parse_from(["site-health", "crawl"]).is_err());
    }

    #[test]
    fn test_evolution_args() {
        let cfg = parse(&["evolution", "--days", "7", "--per-run", "--log-level", "debug"]);
        cfg.validate().unwrap();
        assert_eq!(cfg.log_level.to_string(), "debug");
        assert!(matches!(cfg.command, Command::Evolution(EvolutionArgs { days: 7, per_run: true, .. })));
    }

    #[test]
    fn test_huge_day_count_rejected() {
        for days in ["0", "36501", "9223372036854775807"] {
            let cfg = parse(&["evolution", "--days", days]);
            assert!(cfg.validate().is_err(), "--days {} accepted", days);
        }
        assert!(parse(&["evolution", "--days", "36500"]).validate().is_ok());
    }

    #[test]
    fn test_evolution_window() {
        let now = Utc::now();
        let args = EvolutionArgs { days: 7, per_run: false, json: false };
        let (from, to) = args.window(now).unwrap();
        assert_eq!(to, now);
        assert_eq!(now - from, TimeDelta::days(7));

        // out of range even without validation
        let args = EvolutionArgs { days: i64::MAX, per_run: false, json: false };
        assert!(args.window(now).is_err());
    }
}
