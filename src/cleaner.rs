//! Cleaning and merging.
//!
//! Records failing `missing_values` or `negative_or_missing_energy` are
//! dropped; outlier and stale records are kept with their verdict attached.
//! The full, unfiltered verdict list is kept next to the cleaned series so
//! the quality report can count everything.

use crate::model::{Observation, ValidationVerdict};
use crate::parser::SeriesAssembly;
use crate::validator::Validator;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// An observation together with its verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessedRecord {
    pub observation: Observation,
    pub verdict: ValidationVerdict,
}

/// Chronological retained records for one city.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSeries {
    pub city_id: String,
    pub records: Vec<AssessedRecord>,
}

impl CleanedSeries {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Everything the cleaning stage knows about one city.
#[derive(Debug, Clone)]
pub struct CityOutcome {
    pub city_id: String,
    /// Every assembled observation with its verdict, before filtering.
    pub assessed: Vec<AssessedRecord>,
    pub cleaned: CleanedSeries,
    pub malformed_records: usize,
    pub duplicates_replaced: usize,
}

impl CityOutcome {
    pub fn dropped_records(&self) -> usize {
        self.assessed.len() - self.cleaned.len()
    }
}

/// Validates an assembled series and applies the drop policy.
pub fn clean_city(city_id: &str, assembly: SeriesAssembly, validator: &Validator) -> CityOutcome {
    let assessed: Vec<AssessedRecord> = assembly
        .observations
        .into_iter()
        .map(|observation| {
            let verdict = validator.validate(&observation);
            AssessedRecord {
                observation,
                verdict,
            }
        })
        .collect();

    let records: Vec<AssessedRecord> = assessed
        .iter()
        .filter(|r| !r.verdict.should_drop())
        .cloned()
        .collect();

    let outcome = CityOutcome {
        city_id: city_id.to_string(),
        cleaned: CleanedSeries {
            city_id: city_id.to_string(),
            records,
        },
        assessed,
        malformed_records: assembly.rejected.len(),
        duplicates_replaced: assembly.duplicates_replaced,
    };

    info!(
        city_id,
        total = outcome.assessed.len(),
        retained = outcome.cleaned.len(),
        dropped = outcome.dropped_records(),
        malformed = outcome.malformed_records,
        "City cleaned"
    );

    outcome
}

/// All cities' cleaned records keyed by `(city_id, date)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    pub records: Vec<AssessedRecord>,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Concatenates cleaned series and sorts by `(city_id, date)`.
///
/// If a key appears more than once, the record from the later series (or
/// later within a series) wins.
pub fn merge_series<'a>(series: impl IntoIterator<Item = &'a CleanedSeries>) -> MergedTable {
    let mut keyed: BTreeMap<(String, chrono::NaiveDate), AssessedRecord> = BTreeMap::new();

    for s in series {
        for record in &s.records {
            let key = (
                record.observation.city_id.clone(),
                record.observation.date,
            );
            if keyed.insert(key, record.clone()).is_some() {
                debug!(
                    city_id = %record.observation.city_id,
                    date = %record.observation.date,
                    "Duplicate merge key, keeping later record"
                );
            }
        }
    }

    MergedTable {
        records: keyed.into_values().collect(),
    }
}
