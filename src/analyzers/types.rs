//! Data types used by the analytics stage.

use crate::output::MergedRow;
use chrono::NaiveDate;
use serde::Serialize;

/// A merged row with every measurement present.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRow {
    pub city_id: String,
    pub date: NaiveDate,
    pub temp_max_f: f64,
    pub temp_min_f: f64,
    pub energy_mwh: f64,
}

impl AnalysisRow {
    /// Rows with any measurement absent are not analysable.
    pub fn from_merged(row: &MergedRow) -> Option<Self> {
        Some(AnalysisRow {
            city_id: row.city_id.clone(),
            date: row.date,
            temp_max_f: row.temp_max_f?,
            temp_min_f: row.temp_min_f?,
            energy_mwh: row.energy_mwh?,
        })
    }
}

/// Variables taking part in the correlation matrix, in output order.
pub const CORRELATED: [&str; 3] = ["temp_max_f", "temp_min_f", "energy_mwh"];

/// Pearson matrix over [`CORRELATED`]; `None` cells are undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub cells: [[Option<f64>; 3]; 3],
}

/// One row of `correlation_matrix.csv`.
#[derive(Debug, Serialize)]
pub struct CorrelationRow {
    pub variable: &'static str,
    pub temp_max_f: Option<f64>,
    pub temp_min_f: Option<f64>,
    pub energy_mwh: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DayType {
    Weekday,
    Weekend,
}

/// Demand statistics for weekdays or weekends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTypeSummary {
    pub day_type: DayType,
    pub mean: f64,
    pub std: Option<f64>,
    pub count: usize,
}

/// Mean demand for one city in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalPattern {
    pub city_id: String,
    pub month: u32,
    pub avg_energy_mwh: f64,
}

/// Latest-day snapshot for one city with day-over-day demand change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeographicOverview {
    pub city_id: String,
    pub date: NaiveDate,
    pub temp_max_f: f64,
    pub temp_min_f: f64,
    pub energy_mwh: f64,
    pub energy_pct_change: Option<f64>,
}

/// Bands of daily maximum temperature used by the heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TempBand {
    Below50,
    From50To60,
    From60To70,
    From70To80,
    From80To90,
    Above90,
}

impl TempBand {
    pub const ALL: [TempBand; 6] = [
        TempBand::Below50,
        TempBand::From50To60,
        TempBand::From60To70,
        TempBand::From70To80,
        TempBand::From80To90,
        TempBand::Above90,
    ];

    pub fn of(temp_max_f: f64) -> Self {
        match temp_max_f {
            t if t < 50.0 => TempBand::Below50,
            t if t < 60.0 => TempBand::From50To60,
            t if t < 70.0 => TempBand::From60To70,
            t if t < 80.0 => TempBand::From70To80,
            t if t < 90.0 => TempBand::From80To90,
            _ => TempBand::Above90,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TempBand::Below50 => "<50°F",
            TempBand::From50To60 => "50-60°F",
            TempBand::From60To70 => "60-70°F",
            TempBand::From70To80 => "70-80°F",
            TempBand::From80To90 => "80-90°F",
            TempBand::Above90 => ">90°F",
        }
    }
}

/// Mean demand by temperature band (rows) and weekday (Monday first).
/// Combinations with no data are 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    pub rows: Vec<(TempBand, [f64; 7])>,
}

/// One row of `heatmap_matrix.csv`.
#[derive(Debug, Serialize)]
pub struct HeatmapRow {
    pub temp_range: &'static str,
    #[serde(rename = "Monday")]
    pub monday: f64,
    #[serde(rename = "Tuesday")]
    pub tuesday: f64,
    #[serde(rename = "Wednesday")]
    pub wednesday: f64,
    #[serde(rename = "Thursday")]
    pub thursday: f64,
    #[serde(rename = "Friday")]
    pub friday: f64,
    #[serde(rename = "Saturday")]
    pub saturday: f64,
    #[serde(rename = "Sunday")]
    pub sunday: f64,
}

/// Every analytics result for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub correlation: CorrelationMatrix,
    pub weekday_weekend: Vec<DayTypeSummary>,
    pub seasonal: Vec<SeasonalPattern>,
    pub overview: Vec<GeographicOverview>,
    pub heatmap: Heatmap,
}
