//! Per-city data quality report.
//!
//! Counters are not mutually exclusive: a record with two tags increments
//! two counters.

use crate::cleaner::CityOutcome;
use crate::model::{ReportingWindow, RuleTag};
use chrono::NaiveDate;
use serde::Serialize;

/// One row of `data_quality_report.csv`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CityQuality {
    pub city_id: String,

    // rule counters
    pub missing_values: usize,
    pub temperature_outliers: usize,
    pub negative_or_missing_energy: usize,
    pub stale_records: usize,

    // coverage
    pub total_records: usize,
    pub window_start: Option<NaiveDate>,
    pub window_end: Option<NaiveDate>,
    pub days_since_last_record: Option<i64>,

    // bookkeeping
    pub retained_records: usize,
    pub dropped_records: usize,
    pub malformed_records: usize,
    pub duplicates_replaced: usize,
}

impl CityQuality {
    /// Builds the row from the full verdict list of a city. `today` anchors
    /// `days_since_last_record`.
    pub fn from_outcome(outcome: &CityOutcome, today: NaiveDate) -> Self {
        let mut q = CityQuality {
            city_id: outcome.city_id.clone(),
            total_records: outcome.assessed.len(),
            retained_records: outcome.cleaned.len(),
            dropped_records: outcome.dropped_records(),
            malformed_records: outcome.malformed_records,
            duplicates_replaced: outcome.duplicates_replaced,
            ..Default::default()
        };

        for record in &outcome.assessed {
            for tag in record.verdict.tags() {
                *q.counter_mut(tag) += 1;
            }
        }

        let window = ReportingWindow::covering(outcome.assessed.iter().map(|r| &r.observation));
        if let Some(w) = window {
            q.window_start = Some(w.start);
            q.window_end = Some(w.end);
            q.days_since_last_record = Some((today - w.end).num_days());
        }

        q
    }

    pub fn window(&self) -> Option<ReportingWindow> {
        self.window_start
            .zip(self.window_end)
            .map(|(start, end)| ReportingWindow { start, end })
    }

    pub fn count(&self, tag: RuleTag) -> usize {
        match tag {
            RuleTag::MissingValues => self.missing_values,
            RuleTag::TemperatureOutliers => self.temperature_outliers,
            RuleTag::NegativeOrMissingEnergy => self.negative_or_missing_energy,
            RuleTag::StaleRecords => self.stale_records,
        }
    }

    fn counter_mut(&mut self, tag: RuleTag) -> &mut usize {
        match tag {
            RuleTag::MissingValues => &mut self.missing_values,
            RuleTag::TemperatureOutliers => &mut self.temperature_outliers,
            RuleTag::NegativeOrMissingEnergy => &mut self.negative_or_missing_energy,
            RuleTag::StaleRecords => &mut self.stale_records,
        }
    }

    /// True when any rule fired or any raw row had to be excluded.
    pub fn has_issues(&self) -> bool {
        self.malformed_records > 0 || RuleTag::ALL.iter().any(|t| self.count(*t) > 0)
    }
}

/// The quality report for one run, one row per city in roster order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityReport {
    pub cities: Vec<CityQuality>,
}

impl QualityReport {
    pub fn build<'a>(outcomes: impl IntoIterator<Item = &'a CityOutcome>, today: NaiveDate) -> Self {
        Self {
            cities: outcomes
                .into_iter()
                .map(|o| CityQuality::from_outcome(o, today))
                .collect(),
        }
    }

    pub fn city(&self, city_id: &str) -> Option<&CityQuality> {
        self.cities.iter().find(|c| c.city_id == city_id)
    }

    pub fn total(&self, tag: RuleTag) -> usize {
        self.cities.iter().map(|c| c.count(tag)).sum()
    }
}
