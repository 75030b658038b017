//! Daily max/min temperatures from the NOAA CDO v2 `data` endpoint
//! (GHCND dataset).

use super::{HttpClient, RetryPolicy, fetch_json, round2, window_start, with_backoff};
use crate::config::City;
use crate::error::FetchError;
use crate::parser::{RawWeatherRecord, celsius_to_fahrenheit, parse_date};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const NOAA_DATA_URL: &str = "https://www.ncei.noaa.gov/cdo-web/api/v2/data";

#[derive(Debug, Deserialize)]
struct NoaaResponse {
    #[serde(default)]
    results: Vec<NoaaResult>,
}

#[derive(Debug, Deserialize)]
struct NoaaResult {
    date: String,
    datatype: String,
    value: f64,
}

pub struct NoaaClient<C> {
    client: C,
    base_url: String,
    policy: RetryPolicy,
}

impl<C: HttpClient> NoaaClient<C> {
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self {
            client,
            base_url: NOAA_DATA_URL.to_string(),
            policy,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Requests twice the wanted span (stations report with a lag) and keeps
    /// the most recent `days` dates.
    #[tracing::instrument(skip(self, city), fields(city_id = %city.id, station = %city.noaa_station))]
    pub async fn fetch_weather(
        &self,
        city: &City,
        days: u32,
        today: NaiveDate,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<RawWeatherRecord>, FetchError> {
        let start = window_start(today, days)?;
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("datasetid", "GHCND".to_string()),
                ("stationid", city.noaa_station.clone()),
                ("startdate", start.to_string()),
                ("enddate", today.to_string()),
                ("datatypeid", "TMAX,TMIN".to_string()),
                ("limit", "1000".to_string()),
                ("units", "metric".to_string()),
            ],
        )
        .map_err(|e| FetchError::Url(e.to_string()))?;

        info!(%start, end = %today, "Fetching weather");
        let body = with_backoff(self.policy, "noaa", || fetch_json(&self.client, url.clone())).await?;
        let records = decode_weather(&city.id, body, days, fetched_at)?;

        if records.is_empty() {
            warn!("No weather data returned");
        } else if let Some(latest) = records.last().and_then(|r| r.date.as_deref()) {
            if latest < today.to_string().as_str() {
                warn!(latest, "Weather data not up to date");
            }
        }
        info!(records = records.len(), "Weather data ready");
        Ok(records)
    }
}

/// Pivots NOAA `TMAX`/`TMIN` rows into one record per date, in °F.
///
/// A date missing one of the two readings is kept with that reading empty.
pub fn decode_weather(
    city_id: &str,
    body: serde_json::Value,
    days: u32,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<RawWeatherRecord>, FetchError> {
    let response: NoaaResponse =
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))?;

    let mut by_date: BTreeMap<NaiveDate, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for row in response.results {
        let Some(date) = parse_date(&row.date) else {
            warn!(date = %row.date, "Skipping NOAA row with unreadable date");
            continue;
        };
        let slot = by_date.entry(date).or_default();
        match row.datatype.as_str() {
            "TMAX" => slot.0 = Some(row.value),
            "TMIN" => slot.1 = Some(row.value),
            _ => {}
        }
    }

    let fetched_at = fetched_at.to_rfc3339();
    let skip = by_date.len().saturating_sub(days as usize);

    Ok(by_date
        .into_iter()
        .skip(skip)
        .map(|(date, (tmax_c, tmin_c))| RawWeatherRecord {
            city_id: Some(city_id.to_string()),
            date: Some(date.to_string()),
            temp_max_c: tmax_c.map(|c| round2(c).to_string()),
            temp_min_c: tmin_c.map(|c| round2(c).to_string()),
            temp_max_f: tmax_c.map(|c| celsius_to_fahrenheit(c).to_string()),
            temp_min_f: tmin_c.map(|c| celsius_to_fahrenheit(c).to_string()),
            fetched_at: Some(fetched_at.clone()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fetched() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_pivots_and_converts() {
        let body = json!({
            "metadata": { "resultset": { "count": 3 } },
            "results": [
                { "date": "2024-07-01T00:00:00", "datatype": "TMAX", "station": "S", "value": 40.0 },
                { "date": "2024-07-01T00:00:00", "datatype": "TMIN", "station": "S", "value": 25.0 },
                { "date": "2024-07-02T00:00:00", "datatype": "TMAX", "station": "S", "value": 38.3 }
            ]
        });
        let rows = decode_weather("phoenix", body, 90, fetched()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date.as_deref(), Some("2024-07-01"));
        assert_eq!(rows[0].temp_max_f.as_deref(), Some("104"));
        assert_eq!(rows[0].temp_min_f.as_deref(), Some("77"));
        assert_eq!(rows[1].temp_max_f.as_deref(), Some("100.94"));
        assert_eq!(rows[1].temp_min_f, None);
        assert_eq!(rows[0].fetched_at.as_deref(), Some("2024-07-10T00:00:00+00:00"));
    }

    #[test]
    fn test_keeps_most_recent_days() {
        let results: Vec<_> = (1..=5)
            .map(|d| json!({ "date": format!("2024-07-0{d}T00:00:00"), "datatype": "TMAX", "value": 30.0 }))
            .collect();
        let rows = decode_weather("x", json!({ "results": results }), 2, fetched()).unwrap();
        let dates: Vec<_> = rows.iter().map(|r| r.date.clone().unwrap()).collect();
        assert_eq!(dates, vec!["2024-07-04", "2024-07-05"]);
    }

    #[test]
    fn test_empty_body_is_empty_series() {
        let rows = decode_weather("x", json!({}), 90, fetched()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_garbage_body_is_decode_error() {
        let err = decode_weather("x", json!({ "results": "nope" }), 90, fetched()).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
