//! Record model shared by every stage of the pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// One calendar day of weather and energy readings for one city.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub city_id: String,
    pub temp_max_f: Option<f64>,
    pub temp_min_f: Option<f64>,
    pub energy_mwh: Option<f64>,
    /// When the underlying readings were retrieved. `None` when the raw rows
    /// carried no usable timestamp.
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Quality rules an [`Observation`] can violate.
///
/// Ordering follows the column order of the quality report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTag {
    MissingValues,
    TemperatureOutliers,
    NegativeOrMissingEnergy,
    StaleRecords,
}

impl RuleTag {
    pub const ALL: [RuleTag; 4] = [
        RuleTag::MissingValues,
        RuleTag::TemperatureOutliers,
        RuleTag::NegativeOrMissingEnergy,
        RuleTag::StaleRecords,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleTag::MissingValues => "missing_values",
            RuleTag::TemperatureOutliers => "temperature_outliers",
            RuleTag::NegativeOrMissingEnergy => "negative_or_missing_energy",
            RuleTag::StaleRecords => "stale_records",
        }
    }

    /// Records carrying these tags cannot be analysed and are dropped.
    pub fn drops_record(self) -> bool {
        matches!(
            self,
            RuleTag::MissingValues | RuleTag::NegativeOrMissingEnergy
        )
    }
}

impl fmt::Display for RuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of rules an observation failed, each with a note.
///
/// An empty verdict means the observation is clean.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationVerdict {
    violations: BTreeMap<RuleTag, String>,
}

impl ValidationVerdict {
    pub fn flag(&mut self, tag: RuleTag, note: impl Into<String>) {
        self.violations.insert(tag, note.into());
    }

    pub fn has(&self, tag: RuleTag) -> bool {
        self.violations.contains_key(&tag)
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = RuleTag> + '_ {
        self.violations.keys().copied()
    }

    pub fn note(&self, tag: RuleTag) -> Option<&str> {
        self.violations.get(&tag).map(String::as_str)
    }

    pub fn should_drop(&self) -> bool {
        self.tags().any(RuleTag::drops_record)
    }

    /// Tags joined with `;`, the form used in CSV output.
    pub fn tag_list(&self) -> String {
        self.tags()
            .map(RuleTag::as_str)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// First and last date covered by a city's raw series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingWindow {
    /// Returns `None` for an empty series.
    pub fn covering<'a>(observations: impl IntoIterator<Item = &'a Observation>) -> Option<Self> {
        observations.into_iter().fold(None, |acc, o| match acc {
            None => Some(ReportingWindow {
                start: o.date,
                end: o.date,
            }),
            Some(w) => Some(ReportingWindow {
                start: w.start.min(o.date),
                end: w.end.max(o.date),
            }),
        })
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}
