//! Demand patterns by day type, month and temperature band.

use crate::analyzers::types::{
    AnalysisRow, DayType, DayTypeSummary, Heatmap, HeatmapRow, SeasonalPattern, TempBand,
};
use crate::analyzers::utility::{mean, sample_stddev};
use chrono::{Datelike, Weekday};
use std::collections::BTreeMap;

fn day_type(row: &AnalysisRow) -> DayType {
    match row.date.weekday() {
        Weekday::Sat | Weekday::Sun => DayType::Weekend,
        _ => DayType::Weekday,
    }
}

/// Energy mean, sample standard deviation and count for weekdays and
/// weekends. Day types with no rows are omitted.
pub fn weekday_weekend_summary(rows: &[AnalysisRow]) -> Vec<DayTypeSummary> {
    let mut groups: BTreeMap<DayType, Vec<f64>> = BTreeMap::new();
    for row in rows {
        groups.entry(day_type(row)).or_default().push(row.energy_mwh);
    }

    groups
        .into_iter()
        .map(|(day_type, values)| DayTypeSummary {
            day_type,
            mean: mean(&values),
            std: sample_stddev(&values),
            count: values.len(),
        })
        .collect()
}

/// Mean energy per city and calendar month, ordered by city then month.
pub fn seasonal_pattern(rows: &[AnalysisRow]) -> Vec<SeasonalPattern> {
    let mut groups: BTreeMap<(&str, u32), Vec<f64>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.city_id.as_str(), row.date.month()))
            .or_default()
            .push(row.energy_mwh);
    }

    groups
        .into_iter()
        .map(|((city_id, month), values)| SeasonalPattern {
            city_id: city_id.to_string(),
            month,
            avg_energy_mwh: mean(&values),
        })
        .collect()
}

/// Mean energy for every temperature band and weekday pair.
pub fn temperature_heatmap(rows: &[AnalysisRow]) -> Heatmap {
    let mut cells: BTreeMap<(TempBand, u32), Vec<f64>> = BTreeMap::new();
    for row in rows {
        cells
            .entry((
                TempBand::of(row.temp_max_f),
                row.date.weekday().num_days_from_monday(),
            ))
            .or_default()
            .push(row.energy_mwh);
    }

    let rows = TempBand::ALL
        .iter()
        .map(|&band| {
            let mut by_day = [0.0; 7];
            for (day, slot) in by_day.iter_mut().enumerate() {
                if let Some(values) = cells.get(&(band, day as u32)) {
                    *slot = mean(values);
                }
            }
            (band, by_day)
        })
        .collect();

    Heatmap { rows }
}

impl Heatmap {
    pub fn cell(&self, band: TempBand, weekday: Weekday) -> f64 {
        self.rows
            .iter()
            .find(|(b, _)| *b == band)
            .map(|(_, days)| days[weekday.num_days_from_monday() as usize])
            .unwrap_or(0.0)
    }

    pub fn csv_rows(&self) -> Vec<HeatmapRow> {
        self.rows
            .iter()
            .map(|(band, d)| HeatmapRow {
                temp_range: band.label(),
                monday: d[0],
                tuesday: d[1],
                wednesday: d[2],
                thursday: d[3],
                friday: d[4],
                saturday: d[5],
                sunday: d[6],
            })
            .collect()
    }
}
