//! Raw ingestion: turns loosely-typed weather and energy rows into a
//! per-city series of [`Observation`]s.
//!
//! Raw rows are all text because they come straight from CSV files written
//! by the fetcher (or by anything else). Rows that cannot be placed are
//! excluded and reported; unreadable measurements become absent values so
//! the validator can flag them.

use crate::error::MalformedObservation;
use crate::model::Observation;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A weather row as stored in `data/raw/weather/*.csv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWeatherRecord {
    pub city_id: Option<String>,
    pub date: Option<String>,
    #[serde(default)]
    pub temp_max_c: Option<String>,
    #[serde(default)]
    pub temp_min_c: Option<String>,
    pub temp_max_f: Option<String>,
    pub temp_min_f: Option<String>,
    pub fetched_at: Option<String>,
}

/// An energy row as stored in `data/raw/energy/*.csv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEnergyRecord {
    pub city_id: Option<String>,
    pub date: Option<String>,
    /// Older fetcher output names this column `demand`.
    #[serde(alias = "demand")]
    pub energy_mwh: Option<String>,
    pub fetched_at: Option<String>,
}

/// Which raw series a malformed row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    Weather,
    Energy,
}

/// A raw row excluded from processing, with its position in its series.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub source: RecordSource,
    pub index: usize,
    pub reason: MalformedObservation,
}

/// Result of assembling one city's raw rows.
#[derive(Debug, Clone, Default)]
pub struct SeriesAssembly {
    /// Chronological, one observation per date.
    pub observations: Vec<Observation>,
    pub rejected: Vec<RejectedRow>,
    /// Rows superseded by a later row for the same date.
    pub duplicates_replaced: usize,
}

struct WeatherPart {
    temp_max_f: Option<f64>,
    temp_min_f: Option<f64>,
    fetched_at: Option<DateTime<Utc>>,
}

struct EnergyPart {
    energy_mwh: Option<f64>,
    fetched_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct DayParts {
    weather: Option<WeatherPart>,
    energy: Option<EnergyPart>,
}

/// Outer-joins a city's weather and energy rows on date.
///
/// A date seen in only one series yields an observation whose other fields
/// are absent. Within a series, the last row for a date wins.
pub fn assemble_series(
    city_id: &str,
    weather: &[RawWeatherRecord],
    energy: &[RawEnergyRecord],
) -> SeriesAssembly {
    let mut days: BTreeMap<NaiveDate, DayParts> = BTreeMap::new();
    let mut rejected = Vec::new();
    let mut duplicates_replaced = 0;

    for (index, row) in weather.iter().enumerate() {
        let date = match place_row(city_id, row.city_id.as_deref(), row.date.as_deref()) {
            Ok(date) => date,
            Err(reason) => {
                warn!(city_id, index, reason = %reason, "Rejected weather row");
                rejected.push(RejectedRow {
                    source: RecordSource::Weather,
                    index,
                    reason,
                });
                continue;
            }
        };
        let part = WeatherPart {
            temp_max_f: fahrenheit(row.temp_max_f.as_deref(), row.temp_max_c.as_deref(), "temp_max"),
            temp_min_f: fahrenheit(row.temp_min_f.as_deref(), row.temp_min_c.as_deref(), "temp_min"),
            fetched_at: parse_timestamp(row.fetched_at.as_deref()),
        };
        if let (Some(max), Some(min)) = (part.temp_max_f, part.temp_min_f) {
            if max < min {
                warn!(city_id, %date, max, min, "Daily max below daily min, keeping row as is");
            }
        }
        if days.entry(date).or_default().weather.replace(part).is_some() {
            debug!(city_id, %date, "Duplicate weather date, keeping later row");
            duplicates_replaced += 1;
        }
    }

    for (index, row) in energy.iter().enumerate() {
        let date = match place_row(city_id, row.city_id.as_deref(), row.date.as_deref()) {
            Ok(date) => date,
            Err(reason) => {
                warn!(city_id, index, reason = %reason, "Rejected energy row");
                rejected.push(RejectedRow {
                    source: RecordSource::Energy,
                    index,
                    reason,
                });
                continue;
            }
        };
        let part = EnergyPart {
            energy_mwh: parse_measurement("energy_mwh", row.energy_mwh.as_deref()),
            fetched_at: parse_timestamp(row.fetched_at.as_deref()),
        };
        if days.entry(date).or_default().energy.replace(part).is_some() {
            debug!(city_id, %date, "Duplicate energy date, keeping later row");
            duplicates_replaced += 1;
        }
    }

    let observations = days
        .into_iter()
        .map(|(date, parts)| join_day(city_id, date, parts))
        .collect();

    SeriesAssembly {
        observations,
        rejected,
        duplicates_replaced,
    }
}

fn join_day(city_id: &str, date: NaiveDate, parts: DayParts) -> Observation {
    let (temp_max_f, temp_min_f) = parts
        .weather
        .as_ref()
        .map_or((None, None), |w| (w.temp_max_f, w.temp_min_f));
    let energy_mwh = parts.energy.as_ref().and_then(|e| e.energy_mwh);

    // The older retrieval time governs freshness; an unknown time on any
    // contributing row makes the whole observation's time unknown.
    let fetched_at = match (&parts.weather, &parts.energy) {
        (Some(w), Some(e)) => w.fetched_at.zip(e.fetched_at).map(|(w, e)| w.min(e)),
        (Some(w), None) => w.fetched_at,
        (None, Some(e)) => e.fetched_at,
        (None, None) => None,
    };

    Observation {
        date,
        city_id: city_id.to_string(),
        temp_max_f,
        temp_min_f,
        energy_mwh,
        fetched_at,
    }
}

fn place_row(
    expected_city: &str,
    city_id: Option<&str>,
    date: Option<&str>,
) -> Result<NaiveDate, MalformedObservation> {
    let city_id = non_blank(city_id).ok_or(MalformedObservation::MissingCityId)?;
    let date = non_blank(date).ok_or(MalformedObservation::MissingDate)?;
    if city_id != expected_city {
        return Err(MalformedObservation::CityMismatch {
            expected: expected_city.to_string(),
            found: city_id.to_string(),
        });
    }
    parse_date(date).ok_or_else(|| MalformedObservation::InvalidDate(date.to_string()))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parses `YYYY-MM-DD` or the NOAA form `YYYY-MM-DDTHH:MM:SS`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .ok()
}

/// Parses an RFC 3339 timestamp; anything else is treated as unknown.
pub fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = non_blank(value)?;
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

// The °F column wins; the °C column fills it in when it is blank or unreadable.
fn fahrenheit(f: Option<&str>, c: Option<&str>, field: &str) -> Option<f64> {
    parse_measurement(field, f).or_else(|| parse_measurement(field, c).map(celsius_to_fahrenheit))
}

/// °C to °F, rounded to two decimals.
pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    let round2 = |v: f64| (v * 100.0).round() / 100.0;
    round2(round2(c) * 9.0 / 5.0 + 32.0)
}

/// Reads a numeric reading. Blank, non-numeric and non-finite values are
/// all absent.
pub fn parse_measurement(field: &str, value: Option<&str>) -> Option<f64> {
    let value = non_blank(value)?;
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => {
            debug!(field, value, "Unreadable measurement treated as missing");
            None
        }
    }
}
