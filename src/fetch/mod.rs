//! HTTP fetch collaborator: NOAA weather and EIA demand per city.

mod basic;
mod client;
mod retry;
pub mod auth;
pub mod eia;
pub mod noaa;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use eia::EiaClient;
pub use noaa::NoaaClient;
pub use retry::{RetryPolicy, with_backoff};

use crate::config::{City, FetchConfig};
use crate::error::FetchError;
use crate::parser::{RawEnergyRecord, RawWeatherRecord};
use chrono::{DateTime, Days, NaiveDate, Utc};
use reqwest::Url;
use std::time::Duration;

/// Raw rows fetched for one city.
#[derive(Debug, Clone, Default)]
pub struct CityFetch {
    pub weather: Vec<RawWeatherRecord>,
    pub energy: Vec<RawEnergyRecord>,
}

impl RetryPolicy {
    pub fn from_config(cfg: &FetchConfig) -> Self {
        RetryPolicy::new(cfg.max_retries, Duration::from_secs(cfg.backoff_secs))
    }
}

/// Issues a GET and decodes the body as JSON. Non-success statuses become
/// [`FetchError::Status`].
pub async fn fetch_json<C: HttpClient>(client: &C, url: Url) -> Result<serde_json::Value, FetchError> {
    let shown = redact(&url);
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url: shown,
        });
    }
    Ok(resp.json().await?)
}

// Query strings may carry credentials added by a decorator upstream of the
// error, so only scheme, host and path are reported.
fn redact(url: &Url) -> String {
    format!("{}://{}{}", url.scheme(), url.host_str().unwrap_or(""), url.path())
}

/// First date requested for a `days` window. Twice the span is asked for
/// because stations and balancing authorities report with a lag.
pub(crate) fn window_start(today: NaiveDate, days: u32) -> Result<NaiveDate, FetchError> {
    today
        .checked_sub_days(Days::new(u64::from(days) * 2))
        .ok_or_else(|| FetchError::Url(format!("a {days}-day window before {today} is out of range")))
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Fetches both series for one city. A failure on either side fails the
/// city; the caller decides whether that aborts the run.
pub async fn fetch_city<W: HttpClient, E: HttpClient>(
    noaa: &NoaaClient<W>,
    eia: &EiaClient<E>,
    city: &City,
    cfg: &FetchConfig,
    now: DateTime<Utc>,
) -> Result<CityFetch, FetchError> {
    let today = now.date_naive();
    let weather = noaa.fetch_weather(city, cfg.days, today, now).await?;
    let energy = eia.fetch_energy(city, cfg.days, today, now).await?;
    Ok(CityFetch { weather, energy })
}
