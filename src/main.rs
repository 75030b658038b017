//! CLI entry point for the grid weather ETL.
//!
//! Provides subcommands for fetching raw weather and demand data per city,
//! processing it into cleaned tables and a quality report, and producing
//! the analytics tables.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use grid_weather_etl::analyzers::analyzer::analyze;
use grid_weather_etl::config::{ApiKeys, PipelineConfig};
use grid_weather_etl::fetch::auth::{ApiKey, UrlParam};
use grid_weather_etl::fetch::{BasicClient, EiaClient, NoaaClient, RetryPolicy, fetch_city};
use grid_weather_etl::output::{load_raw_inputs, write_processing_outcome, write_raw_series};
use grid_weather_etl::pipeline::process;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "grid_weather_etl")]
#[command(about = "Weather and electricity demand ETL", long_about = None)]
struct Cli {
    /// JSON configuration file (defaults to $ETL_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch raw weather and energy data for every configured city
    Fetch {
        /// Maximum number of cities fetched at once
        #[arg(short, long, default_value_t = 2)]
        concurrency: usize,

        /// Override the number of days to fetch
        #[arg(long)]
        days: Option<u32>,
    },
    /// Validate, clean and merge raw data and write the quality report
    Process,
    /// Compute analytics over the merged table
    Analyze,
    /// Fetch, process and analyze in one go
    Run {
        /// Maximum number of cities fetched at once
        #[arg(short, long, default_value_t = 2)]
        concurrency: usize,

        /// Override the number of days to fetch
        #[arg(long)]
        days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/grid_weather_etl.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("grid_weather_etl.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch { concurrency, days } => {
            apply_days(&mut config, days)?;
            fetch_all(Arc::new(config), concurrency).await?;
        }
        Commands::Process => {
            run_processing(&config)?;
        }
        Commands::Analyze => {
            analyze(&config)?;
        }
        Commands::Run { concurrency, days } => {
            apply_days(&mut config, days)?;
            let config = Arc::new(config);
            fetch_all(config.clone(), concurrency).await?;
            run_processing(&config)?;
            analyze(&config)?;
        }
    }

    Ok(())
}

fn apply_days(config: &mut PipelineConfig, days: Option<u32>) -> Result<()> {
    if let Some(days) = days {
        config.fetch.days = days;
        config.fetch.validate()?;
    }
    Ok(())
}

fn run_processing(config: &PipelineConfig) -> Result<()> {
    let inputs = load_raw_inputs(config)?;
    let outcome = process(config, inputs, Utc::now())?;

    for city in &outcome.report.cities {
        if city.has_issues() {
            warn!(
                city_id = %city.city_id,
                missing_values = city.missing_values,
                temperature_outliers = city.temperature_outliers,
                negative_or_missing_energy = city.negative_or_missing_energy,
                stale_records = city.stale_records,
                "Data quality issues found"
            );
        }
    }

    write_processing_outcome(config, &outcome)?;
    Ok(())
}

/// Fetches every configured city concurrently and saves the raw files.
///
/// A city whose fetch fails is logged and skipped; its previous raw files,
/// if any, are left in place.
#[tracing::instrument(skip(config), fields(cities = config.cities.len(), days = config.fetch.days))]
async fn fetch_all(config: Arc<PipelineConfig>, concurrency: usize) -> Result<()> {
    let keys = ApiKeys::from_env()?;
    let policy = RetryPolicy::from_config(&config.fetch);
    let timeout = Duration::from_secs(config.fetch.timeout_secs);

    let noaa = Arc::new(NoaaClient::new(
        ApiKey::noaa_token(BasicClient::with_timeout(timeout)?, &keys.noaa)?,
        policy,
    ));
    let eia = Arc::new(EiaClient::new(
        UrlParam::eia_key(BasicClient::with_timeout(timeout)?, &keys.eia),
        policy,
    ));

    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let now = Utc::now();

    let mut tasks = vec![];

    for city in &config.cities {
        let sem = semaphore.clone();
        let noaa = noaa.clone();
        let eia = eia.clone();
        let config = config.clone();
        let city = city.clone();

        let city_span = tracing::info_span!("fetch_city", city_id = %city.id, city_name = %city.name);

        let task = tokio::spawn(
            async move {
                let _permit = match sem.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!(error = %e, "Fetch semaphore closed");
                        return None;
                    }
                };

                let fetch_start = std::time::Instant::now();
                match fetch_city(&*noaa, &*eia, &city, &config.fetch, now).await {
                    Ok(fetched) => {
                        info!(
                            weather = fetched.weather.len(),
                            energy = fetched.energy.len(),
                            elapsed_ms = fetch_start.elapsed().as_millis() as u64,
                            "City fetched"
                        );
                        Some((city.id, fetched))
                    }
                    Err(e) => {
                        error!(error = %e, "City fetch failed, keeping previous raw files");
                        None
                    }
                }
            }
            .instrument(city_span),
        );

        tasks.push(task);
    }

    // Wait for all tasks to complete
    let mut fetched = Vec::new();
    for task in tasks {
        match task.await {
            Ok(Some(result)) => fetched.push(result),
            Ok(None) => {}
            Err(e) => error!(error = %e, "Fetch task panicked"),
        }
    }

    for (city_id, data) in &fetched {
        write_raw_series(&config, city_id, data)?;
    }

    info!(
        succeeded = fetched.len(),
        failed = config.cities.len() - fetched.len(),
        "Finished fetching all cities"
    );
    Ok(())
}
