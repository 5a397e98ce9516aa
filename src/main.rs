use anyhow::Result;
use chrono::Utc;
use log2::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use site_health::config::{self, Command, CrawlArgs, EvolutionArgs};
use site_health::crawler;
use site_health::evolution::{self, Bucketing};
use site_health::history::{JsonlHistory, record_blocking, runs_between_blocking};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::Config::new();
    cfg.validate()?;
    let _log2 = stdout()
        .module(true) // include module name
        .module_with_line(true) // include line number from module
        .module_filter(|module| module.starts_with("site_health")) // only this crate
        .compress(false)
        .level(cfg.log_level.to_string())
        .start();

    let history = Arc::new(JsonlHistory::new(cfg.history_file.clone()));

    match &cfg.command {
        Command::Crawl(args) => run_crawl(args, history).await,
        Command::Evolution(args) => show_evolution(args, history).await,
    }
}

async fn run_crawl(args: &CrawlArgs, history: Arc<JsonlHistory>) -> Result<()> {
    let targets = args.targets()?;
    let crawler_config = Arc::new(args.crawler_config());

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping all crawls");
            shutdown.cancel();
        }
    });

    let report = crawler::crawl_all(targets, crawler_config, cancel).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_table();
    }

    if report.cancelled {
        warn!("Run was cancelled, not recording it");
    } else if !args.no_record {
        let record = record_blocking(history.clone(), report).await?;
        info!("Recorded run {} in {}", record.run_id, history.path().display());
    }

    Ok(())
}

async fn show_evolution(args: &EvolutionArgs, history: Arc<JsonlHistory>) -> Result<()> {
    let (from, to) = args.window(Utc::now())?;
    let records = runs_between_blocking(history, from, to).await?;
    let mode = if args.per_run { Bucketing::PerRun } else { Bucketing::Daily };
    let points = evolution::evolution(&records, from, to, mode);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&points)?);
    } else {
        evolution::print_evolution(&points);
    }
    Ok(())
}
