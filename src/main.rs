use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use vinted_scout::config::{self, DataPaths};
use vinted_scout::preprocess::{AdsProcessor, PagesProcessor};
use vinted_scout::scrapers::{AdScraper, CatalogScraper, Scraper};
use vinted_scout::server::{self, AppState};
use vinted_scout::store;

#[derive(Parser)]
#[command(
    name = "vinted-scout",
    about = "Scrape, preprocess and explore Vinted listings",
    version
)]
struct Cli {
    /// Root directory for raw and preprocessed datasets
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape catalog pages (and optionally every listed ad) into raw CSV
    Scrape {
        /// Catalog search URL to paginate through
        #[arg(long)]
        scope_url: String,
        /// Number of catalog pages to fetch
        #[arg(long, default_value_t = 25)]
        max_pages: usize,
        /// Also fetch each listed ad's detail page
        #[arg(long)]
        with_ads: bool,
    },
    /// Normalize the raw CSV batches into Parquet tables
    Preprocess,
    /// Serve the dashboard over the preprocessed pages table
    Serve {
        #[arg(long, default_value = "127.0.0.1:8050")]
        bind: SocketAddr,
        /// Verbose logging for development
        #[arg(long)]
        debug: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let debug = matches!(cli.command, Command::Serve { debug: true, .. });
    config::init_logging(debug);

    info!("🧥 Vinted Scout");

    let paths = DataPaths::new(&cli.data_dir);
    match cli.command {
        Command::Scrape {
            scope_url,
            max_pages,
            with_ads,
        } => scrape(&paths, &scope_url, max_pages, with_ads).await,
        Command::Preprocess => preprocess(&paths),
        Command::Serve { bind, .. } => serve(&paths, bind).await,
    }
}

async fn scrape(paths: &DataPaths, scope_url: &str, max_pages: usize, with_ads: bool) -> Result<()> {
    let mut catalog = CatalogScraper::with_max_pages(scope_url, max_pages)?;
    info!("Scraping {} ({} pages max)", catalog.source_name(), max_pages);
    let items = catalog.scrape().await?;
    info!("Scraped {} item summaries", items.len());
    store::write_raw_csv(&items, &paths.raw_pages)?;

    if with_ads {
        let mut urls = Vec::new();
        let mut ids = Vec::new();
        for (id, record) in &items {
            if let Some(url) = record.get("url").and_then(Value::as_str) {
                urls.push(url.to_string());
                ids.push(id.clone());
            }
        }

        let mut ad_scraper = AdScraper::new(urls, ids)?;
        info!("Scraping {}", ad_scraper.source_name());
        let ads = ad_scraper.scrape().await?;
        store::write_raw_csv(&ads, &paths.raw_ads)?;
    }
    Ok(())
}

fn preprocess(paths: &DataPaths) -> Result<()> {
    let pages = store::read_raw_csv(&paths.raw_pages).context("reading the raw pages batch")?;
    let page_rows = PagesProcessor::new(pages).preprocess_and_save(&paths.prep_pages)?;
    info!("Preprocessed {} page rows", page_rows.len());

    let ads = store::read_raw_csv(&paths.raw_ads).context("reading the raw ads batch")?;
    let ad_rows = AdsProcessor::new(ads).preprocess_and_save(&paths.prep_ads)?;
    info!("Preprocessed {} ad rows", ad_rows.len());
    Ok(())
}

async fn serve(paths: &DataPaths, bind: SocketAddr) -> Result<()> {
    let state = AppState::load(&paths.prep_pages)?;
    server::run(state, bind).await
}
