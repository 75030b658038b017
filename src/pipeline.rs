//! Processing entry point: raw per-city rows in, cleaned tables and the
//! quality report out.

use crate::cleaner::{CityOutcome, MergedTable, clean_city, merge_series};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::parser::{RawEnergyRecord, RawWeatherRecord, RejectedRow, assemble_series};
use crate::report::QualityReport;
use crate::validator::Validator;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{info, warn};

/// Raw rows supplied for one city.
#[derive(Debug, Clone, Default)]
pub struct CityInput {
    pub city_id: String,
    pub weather: Vec<RawWeatherRecord>,
    pub energy: Vec<RawEnergyRecord>,
    /// Rows that could not be decoded from the raw files.
    pub unreadable: Vec<RejectedRow>,
}

/// Everything produced by one processing run.
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    /// One entry per configured city, in roster order.
    pub cities: Vec<CityOutcome>,
    pub merged: MergedTable,
    pub report: QualityReport,
}

/// Runs ingestion, validation, cleaning, merging and reporting for every
/// configured city.
///
/// Cities without an input entry are processed as empty series. Inputs for
/// cities outside the roster are ignored with a warning. Fails only when
/// the configuration is unusable.
pub fn process(
    config: &PipelineConfig,
    inputs: Vec<CityInput>,
    now: DateTime<Utc>,
) -> Result<ProcessingOutcome, PipelineError> {
    if config.cities.is_empty() {
        return Err(PipelineError::NoCities);
    }
    config.validate()?;

    let mut by_city: HashMap<String, CityInput> = HashMap::new();
    for input in inputs {
        if config.city(&input.city_id).is_none() {
            warn!(city_id = %input.city_id, "Input for unknown city ignored");
            continue;
        }
        // Later inputs for the same city extend earlier ones, so their rows
        // win any date collisions.
        let entry = by_city
            .entry(input.city_id.clone())
            .or_insert_with(|| CityInput {
                city_id: input.city_id.clone(),
                ..Default::default()
            });
        entry.weather.extend(input.weather);
        entry.energy.extend(input.energy);
        entry.unreadable.extend(input.unreadable);
    }

    let validator = Validator::new(config.thresholds, now);

    let cities: Vec<CityOutcome> = config
        .cities
        .iter()
        .map(|city| {
            let input = by_city.remove(&city.id).unwrap_or_default();
            if input.weather.is_empty() && input.energy.is_empty() {
                warn!(city_id = %city.id, "No raw data for city");
            }
            let mut assembly = assemble_series(&city.id, &input.weather, &input.energy);
            assembly.rejected.extend(input.unreadable);
            clean_city(&city.id, assembly, &validator)
        })
        .collect();

    let merged = merge_series(cities.iter().map(|c| &c.cleaned));
    let report = QualityReport::build(&cities, now.date_naive());

    info!(
        cities = cities.len(),
        merged_rows = merged.len(),
        "Processing complete"
    );

    Ok(ProcessingOutcome {
        cities,
        merged,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::City;
    use crate::model::RuleTag;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 5, 12, 0, 0).unwrap()
    }

    fn fetched() -> Option<String> {
        Some("2024-07-05T06:00:00Z".to_string())
    }

    fn weather(city: &str, date: &str, tmax: &str, tmin: &str) -> RawWeatherRecord {
        RawWeatherRecord {
            city_id: Some(city.into()),
            date: Some(date.into()),
            temp_max_f: Some(tmax.into()),
            temp_min_f: Some(tmin.into()),
            fetched_at: fetched(),
            ..Default::default()
        }
    }

    fn energy(city: &str, date: &str, mwh: Option<&str>) -> RawEnergyRecord {
        RawEnergyRecord {
            city_id: Some(city.into()),
            date: Some(date.into()),
            energy_mwh: mwh.map(String::from),
            fetched_at: fetched(),
        }
    }

    #[test]
    fn test_phoenix_scenario() {
        let input = CityInput {
            city_id: "phoenix".into(),
            weather: vec![
                weather("phoenix", "2024-07-01", "135", "90"),
                weather("phoenix", "2024-07-02", "95", "70"),
                weather("phoenix", "2024-07-03", "80", "60"),
            ],
            energy: vec![
                energy("phoenix", "2024-07-01", Some("50")),
                energy("phoenix", "2024-07-02", None),
                energy("phoenix", "2024-07-03", Some("-5")),
            ],
            ..Default::default()
        };

        let out = process(&PipelineConfig::default(), vec![input], now()).unwrap();
        let phoenix = out.cities.iter().find(|c| c.city_id == "phoenix").unwrap();

        assert_eq!(phoenix.cleaned.len(), 1);
        assert_eq!(phoenix.cleaned.records[0].observation.temp_max_f, Some(135.0));

        let q = out.report.city("phoenix").unwrap();
        assert_eq!(q.missing_values, 1);
        assert_eq!(q.temperature_outliers, 1);
        // Absent energy fails the energy rule as well as the missing rule.
        assert_eq!(q.negative_or_missing_energy, 2);
        assert_eq!(q.stale_records, 0);
        assert_eq!(q.total_records, 3);
    }

    #[test]
    fn test_every_configured_city_gets_a_row() {
        let out = process(&PipelineConfig::default(), vec![], now()).unwrap();
        assert_eq!(out.cities.len(), 5);
        assert_eq!(out.report.cities.len(), 5);
        assert!(out.merged.is_empty());
        for q in &out.report.cities {
            assert_eq!(q.total_records, 0);
            assert_eq!(q.window(), None);
        }
    }

    #[test]
    fn test_empty_roster_aborts() {
        let cfg = PipelineConfig {
            cities: vec![],
            ..Default::default()
        };
        assert!(matches!(
            process(&cfg, vec![], now()),
            Err(PipelineError::NoCities)
        ));
    }

    #[test]
    fn test_invalid_thresholds_abort() {
        let mut cfg = PipelineConfig::default();
        cfg.thresholds.freshness_days = -3;
        assert!(matches!(
            process(&cfg, vec![], now()),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_city_input_ignored() {
        let input = CityInput {
            city_id: "atlantis".into(),
            weather: vec![weather("atlantis", "2024-07-01", "70", "60")],
            energy: vec![],
            ..Default::default()
        };
        let out = process(&PipelineConfig::default(), vec![input], now()).unwrap();
        assert!(out.report.city("atlantis").is_none());
        assert_eq!(out.report.total(RuleTag::MissingValues), 0);
    }

    #[test]
    fn test_repeated_input_later_rows_win() {
        let cfg = PipelineConfig {
            cities: vec![PipelineConfig::default().cities[0].clone()],
            ..Default::default()
        };
        let first = CityInput {
            city_id: "new_york".into(),
            weather: vec![weather("new_york", "2024-07-01", "80", "65")],
            energy: vec![energy("new_york", "2024-07-01", Some("400000"))],
            ..Default::default()
        };
        let refetch = CityInput {
            city_id: "new_york".into(),
            weather: vec![weather("new_york", "2024-07-01", "82", "66")],
            energy: vec![energy("new_york", "2024-07-01", Some("410000"))],
            ..Default::default()
        };
        let out = process(&cfg, vec![first, refetch], now()).unwrap();

        assert_eq!(out.merged.len(), 1);
        let obs = &out.merged.records[0].observation;
        assert_eq!(obs.temp_max_f, Some(82.0));
        assert_eq!(obs.energy_mwh, Some(410000.0));
        assert_eq!(out.report.cities[0].duplicates_replaced, 2);
    }

    #[test]
    fn test_merged_table_spans_cities() {
        let cfg = PipelineConfig {
            cities: vec![
                City {
                    id: "b".into(),
                    name: "B".into(),
                    noaa_station: "S".into(),
                    eia_region: "R".into(),
                    eia_timezone: "Pacific".into(),
                },
                City {
                    id: "a".into(),
                    name: "A".into(),
                    noaa_station: "S".into(),
                    eia_region: "R".into(),
                    eia_timezone: "Pacific".into(),
                },
            ],
            ..Default::default()
        };
        let inputs = vec![
            CityInput {
                city_id: "b".into(),
                weather: vec![weather("b", "2024-07-01", "70", "60")],
                energy: vec![energy("b", "2024-07-01", Some("1"))],
                ..Default::default()
            },
            CityInput {
                city_id: "a".into(),
                weather: vec![weather("a", "2024-07-02", "70", "60")],
                energy: vec![energy("a", "2024-07-02", Some("1"))],
                ..Default::default()
            },
        ];
        let out = process(&cfg, inputs, now()).unwrap();
        let ids: Vec<_> = out
            .merged
            .records
            .iter()
            .map(|r| r.observation.city_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        // Report keeps roster order.
        assert_eq!(out.report.cities[0].city_id, "b");
    }
}
