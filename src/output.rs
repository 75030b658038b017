//! CSV persistence for raw inputs and processed artifacts.
//!
//! Every write replaces the target file; artifacts are rebuilt from scratch
//! on each run.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::cleaner::{AssessedRecord, CleanedSeries, MergedTable};
use crate::config::PipelineConfig;
use crate::error::MalformedObservation;
use crate::fetch::CityFetch;
use crate::parser::{RecordSource, RejectedRow};
use crate::pipeline::{CityInput, ProcessingOutcome};
use crate::report::QualityReport;

/// Row of `{city}_cleaned.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRow {
    pub date: NaiveDate,
    pub temp_max_f: Option<f64>,
    pub temp_min_f: Option<f64>,
    pub energy_mwh: Option<f64>,
    pub verdict_tags: String,
}

/// Row of `merged_data.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub city_id: String,
    pub date: NaiveDate,
    pub temp_max_f: Option<f64>,
    pub temp_min_f: Option<f64>,
    pub energy_mwh: Option<f64>,
    pub verdict_tags: String,
}

impl From<&AssessedRecord> for CleanedRow {
    fn from(r: &AssessedRecord) -> Self {
        let o = &r.observation;
        CleanedRow {
            date: o.date,
            temp_max_f: o.temp_max_f,
            temp_min_f: o.temp_min_f,
            energy_mwh: o.energy_mwh,
            verdict_tags: r.verdict.tag_list(),
        }
    }
}

impl From<&AssessedRecord> for MergedRow {
    fn from(r: &AssessedRecord) -> Self {
        let o = &r.observation;
        MergedRow {
            city_id: o.city_id.clone(),
            date: o.date,
            temp_max_f: o.temp_max_f,
            temp_min_f: o.temp_min_f,
            energy_mwh: o.energy_mwh,
            verdict_tags: r.verdict.tag_list(),
        }
    }
}

/// Writes `rows` to `path` with a header line, creating parent directories
/// and truncating any existing file.
pub fn write_records<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    let mut count = 0;
    for row in rows {
        writer.serialize(row)?;
        count += 1;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = count, "CSV written");
    Ok(count)
}

/// Reads every row of a CSV file with headers.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result.with_context(|| format!("reading {}", path.display()))?);
    }
    Ok(rows)
}

/// Rows of one raw file, plus the rows that could not be decoded.
#[derive(Debug)]
pub struct RawRows<T> {
    pub rows: Vec<T>,
    pub unreadable: Vec<RejectedRow>,
}

/// Reads a raw CSV file row by row. A row with the wrong number of fields or
/// an undecodable value is logged and set aside; only I/O failures abort.
/// A missing file reads as no rows.
pub fn read_raw_rows<T: DeserializeOwned>(path: &Path, source: RecordSource) -> Result<RawRows<T>> {
    let mut raw = RawRows {
        rows: Vec::new(),
        unreadable: Vec::new(),
    };
    if !path.exists() {
        debug!(path = %path.display(), "Raw file not found, treating as empty");
        return Ok(raw);
    }

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);

    for (index, result) in reader.deserialize().enumerate() {
        match result {
            Ok(row) => raw.rows.push(row),
            Err(e) if e.is_io_error() => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
            Err(e) => {
                warn!(path = %path.display(), index, error = %e, "Unreadable raw row skipped");
                raw.unreadable.push(RejectedRow {
                    source,
                    index,
                    reason: MalformedObservation::Unreadable(e.to_string()),
                });
            }
        }
    }
    Ok(raw)
}

pub fn write_cleaned_series(path: &Path, series: &CleanedSeries) -> Result<usize> {
    write_records(path, series.records.iter().map(CleanedRow::from))
}

pub fn write_merged_table(path: &Path, table: &MergedTable) -> Result<usize> {
    write_records(path, table.records.iter().map(MergedRow::from))
}

pub fn write_quality_report(path: &Path, report: &QualityReport) -> Result<usize> {
    write_records(path, &report.cities)
}

/// Saves one city's fetched rows as its raw weather and energy files.
pub fn write_raw_series(config: &PipelineConfig, city_id: &str, fetched: &CityFetch) -> Result<()> {
    let days = config.fetch.days;
    let weather_path = config.paths.weather_file(city_id, days);
    let rows = write_records(&weather_path, &fetched.weather)?;
    info!(city_id, rows, path = %weather_path.display(), "Raw weather saved");

    let energy_path = config.paths.energy_file(city_id, days);
    let rows = write_records(&energy_path, &fetched.energy)?;
    info!(city_id, rows, path = %energy_path.display(), "Raw energy saved");
    Ok(())
}

/// Loads each configured city's raw weather and energy files.
pub fn load_raw_inputs(config: &PipelineConfig) -> Result<Vec<CityInput>> {
    let days = config.fetch.days;
    config
        .cities
        .iter()
        .map(|city| {
            let weather =
                read_raw_rows(&config.paths.weather_file(&city.id, days), RecordSource::Weather)?;
            let energy =
                read_raw_rows(&config.paths.energy_file(&city.id, days), RecordSource::Energy)?;
            let mut unreadable = weather.unreadable;
            unreadable.extend(energy.unreadable);
            Ok(CityInput {
                city_id: city.id.clone(),
                weather: weather.rows,
                energy: energy.rows,
                unreadable,
            })
        })
        .collect()
}

/// Writes every per-city cleaned table, the merged table and the quality
/// report under the processed directory.
#[tracing::instrument(skip_all, fields(dir = %config.paths.processed_dir.display()))]
pub fn write_processing_outcome(config: &PipelineConfig, outcome: &ProcessingOutcome) -> Result<()> {
    for city in &outcome.cities {
        let path = config.paths.cleaned_file(&city.city_id);
        let rows = write_cleaned_series(&path, &city.cleaned)?;
        info!(city_id = %city.city_id, rows, path = %path.display(), "Cleaned series saved");
    }

    let merged_path = config.paths.merged_file();
    let rows = write_merged_table(&merged_path, &outcome.merged)?;
    info!(rows, path = %merged_path.display(), "Merged table saved");

    let report_path = config.paths.quality_report_file();
    write_quality_report(&report_path, &outcome.report)?;
    info!(path = %report_path.display(), "Data quality report saved");

    Ok(())
}
