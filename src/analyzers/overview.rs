use crate::analyzers::types::{AnalysisRow, GeographicOverview};
use chrono::Duration;
use std::collections::HashMap;

/// One row per city present on the latest date in `rows`, with the change in
/// demand from that city's previous day.
///
/// The change is undefined when there is no previous-day row or its demand
/// is zero.
pub fn geographic_overview(rows: &[AnalysisRow]) -> Vec<GeographicOverview> {
    let Some(latest) = rows.iter().map(|r| r.date).max() else {
        return Vec::new();
    };
    let yesterday = latest - Duration::days(1);

    let previous: HashMap<&str, f64> = rows
        .iter()
        .filter(|r| r.date == yesterday)
        .map(|r| (r.city_id.as_str(), r.energy_mwh))
        .collect();

    let mut overview: Vec<GeographicOverview> = rows
        .iter()
        .filter(|r| r.date == latest)
        .map(|r| {
            let energy_pct_change = previous
                .get(r.city_id.as_str())
                .filter(|prev| **prev != 0.0)
                .map(|prev| (r.energy_mwh - prev) * 100.0 / prev);
            GeographicOverview {
                city_id: r.city_id.clone(),
                date: r.date,
                temp_max_f: r.temp_max_f,
                temp_min_f: r.temp_min_f,
                energy_mwh: r.energy_mwh,
                energy_pct_change,
            }
        })
        .collect();

    overview.sort_by(|a, b| a.city_id.cmp(&b.city_id));
    overview
}
