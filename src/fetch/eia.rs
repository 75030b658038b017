//! Daily demand from the EIA v2 `electricity/rto/daily-region-data` route.

use super::{HttpClient, RetryPolicy, fetch_json, window_start, with_backoff};
use crate::config::City;
use crate::error::FetchError;
use crate::parser::{RawEnergyRecord, parse_date};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const EIA_DAILY_URL: &str = "https://api.eia.gov/v2/electricity/rto/daily-region-data/data/";

#[derive(Debug, Deserialize)]
struct EiaEnvelope {
    #[serde(default)]
    response: EiaResponse,
}

#[derive(Debug, Default, Deserialize)]
struct EiaResponse {
    #[serde(default)]
    data: Vec<EiaRow>,
}

#[derive(Debug, Deserialize)]
struct EiaRow {
    period: String,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    value: Value,
}

pub struct EiaClient<C> {
    client: C,
    base_url: String,
    policy: RetryPolicy,
}

impl<C: HttpClient> EiaClient<C> {
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self {
            client,
            base_url: EIA_DAILY_URL.to_string(),
            policy,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[tracing::instrument(skip(self, city), fields(city_id = %city.id, region = %city.eia_region))]
    pub async fn fetch_energy(
        &self,
        city: &City,
        days: u32,
        today: NaiveDate,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<RawEnergyRecord>, FetchError> {
        let start = window_start(today, days)?;
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("frequency", "daily"),
                ("start", start.to_string().as_str()),
                ("end", today.to_string().as_str()),
                ("data[0]", "value"),
                ("facets[respondent][]", city.eia_region.as_str()),
                ("facets[timezone][]", city.eia_timezone.as_str()),
                ("facets[type][]", "D"),
                ("sort[0][column]", "period"),
                ("sort[0][direction]", "asc"),
                ("offset", "0"),
                ("length", "5000"),
            ],
        )
        .map_err(|e| FetchError::Url(e.to_string()))?;

        info!(%start, end = %today, "Fetching energy");
        let body = with_backoff(self.policy, "eia", || fetch_json(&self.client, url.clone())).await?;
        let records = decode_energy(&city.id, &city.eia_timezone, body, days, fetched_at)?;

        if records.is_empty() {
            warn!("No energy data returned");
        }
        info!(records = records.len(), "Energy data ready");
        Ok(records)
    }
}

/// Keeps demand rows in `timezone`, one per date (first wins), dropping rows
/// with no numeric value, then the most recent `days` dates.
pub fn decode_energy(
    city_id: &str,
    timezone: &str,
    body: Value,
    days: u32,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<RawEnergyRecord>, FetchError> {
    let envelope: EiaEnvelope =
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in envelope.response.data {
        if row.timezone.as_deref().is_some_and(|tz| tz != timezone) {
            continue;
        }
        if row.kind.as_deref().is_some_and(|k| k != "D") {
            continue;
        }
        let Some(date) = parse_date(&row.period) else {
            warn!(period = %row.period, "Skipping EIA row with unreadable period");
            continue;
        };
        let Some(value) = numeric(&row.value) else {
            continue;
        };
        by_date.entry(date).or_insert(value);
    }

    let fetched_at = fetched_at.to_rfc3339();
    let skip = by_date.len().saturating_sub(days as usize);

    Ok(by_date
        .into_iter()
        .skip(skip)
        .map(|(date, value)| RawEnergyRecord {
            city_id: Some(city_id.to_string()),
            date: Some(date.to_string()),
            energy_mwh: Some(value.to_string()),
            fetched_at: Some(fetched_at.clone()),
        })
        .collect())
}

// EIA sends numbers as strings on some routes and as JSON numbers on others.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}
