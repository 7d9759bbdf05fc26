mod config;
mod db;
mod dom;
mod extract;
mod fetch;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{Config, Overrides};

#[derive(Parser)]
#[command(
    name = "weather_updater",
    about = "Fetch the NWS dwml forecast and update the village report row"
)]
struct Cli {
    /// Latitude of the monitored location
    #[arg(long)]
    lat: Option<f64>,
    /// Longitude of the monitored location
    #[arg(long)]
    lon: Option<f64>,
    /// Forecast service base URL
    #[arg(long)]
    feed_url: Option<String>,
    /// SQLite database path
    #[arg(long)]
    db: Option<String>,
    /// Fetch and write timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Retry the fetch once on a transient failure
    #[arg(long)]
    retry: bool,
}

#[derive(Debug, Error)]
enum RunError {
    #[error("fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),
    #[error("extraction error: {0}")]
    Extraction(#[from] extract::FieldError),
    #[error("persistence error: {0}")]
    Persistence(#[from] db::PersistenceError),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = Overrides {
        lat: cli.lat,
        lon: cli.lon,
        feed_url: cli.feed_url,
        db_path: cli.db,
        timeout_secs: cli.timeout,
        retry_once: cli.retry.then_some(true),
    };

    let cfg = match Config::load(overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("configuration error: {e:#}");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&cfg).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cfg: &Config) -> Result<(), RunError> {
    // The write channel opens before the fetch and is released on every
    // exit path, extraction failures included.
    let conn = db::connect(&cfg.db_path, cfg.timeout_secs)?;
    db::init_schema(&conn)?;
    info!("opened report database at {}", cfg.db_path);

    info!("fetching forecast for ({}, {})", cfg.lat, cfg.lon);
    let doc = fetch::fetch_forecast(cfg).await?;

    let fields = extract::extract_fields(&doc)?;
    info!("extracted {} fields from the feed", fields.len());

    db::update_report(&conn, &fields)?;
    info!("report row updated");
    Ok(())
}
