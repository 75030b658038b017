use crate::analyzers::correlation::compute_correlation;
use crate::analyzers::overview::geographic_overview;
use crate::analyzers::patterns::{seasonal_pattern, temperature_heatmap, weekday_weekend_summary};
use crate::analyzers::types::{AnalysisReport, AnalysisRow};
use crate::config::PipelineConfig;
use crate::output::{MergedRow, read_records, write_records};
use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

pub const CORRELATION_FILE: &str = "correlation_matrix.csv";
pub const WEEKDAY_WEEKEND_FILE: &str = "weekday_weekend_summary.csv";
pub const SEASONAL_FILE: &str = "seasonal_pattern_summary.csv";
pub const OVERVIEW_FILE: &str = "geographic_overview.csv";
pub const HEATMAP_FILE: &str = "heatmap_matrix.csv";

/// Computes every analytics table over the merged rows that carry all three
/// measurements.
pub fn generate_analysis_report(merged: &[MergedRow]) -> AnalysisReport {
    let rows: Vec<AnalysisRow> = merged.iter().filter_map(AnalysisRow::from_merged).collect();
    if rows.len() < merged.len() {
        info!(
            skipped = merged.len() - rows.len(),
            "Rows with absent measurements left out of analysis"
        );
    }

    AnalysisReport {
        correlation: compute_correlation(&rows),
        weekday_weekend: weekday_weekend_summary(&rows),
        seasonal: seasonal_pattern(&rows),
        overview: geographic_overview(&rows),
        heatmap: temperature_heatmap(&rows),
    }
}

/// Writes each analytics table under `dir`, replacing earlier runs.
pub fn write_analysis_report(dir: &Path, report: &AnalysisReport) -> Result<()> {
    write_records(&dir.join(CORRELATION_FILE), report.correlation.csv_rows())?;
    write_records(&dir.join(WEEKDAY_WEEKEND_FILE), &report.weekday_weekend)?;
    write_records(&dir.join(SEASONAL_FILE), &report.seasonal)?;
    write_records(&dir.join(OVERVIEW_FILE), &report.overview)?;
    write_records(&dir.join(HEATMAP_FILE), report.heatmap.csv_rows())?;
    Ok(())
}

/// Reads `merged_data.csv`, computes the analytics and writes them next to it.
#[tracing::instrument(skip_all, fields(dir = %config.paths.processed_dir.display()))]
pub fn analyze(config: &PipelineConfig) -> Result<AnalysisReport> {
    let merged: Vec<MergedRow> = read_records(&config.paths.merged_file())?;
    if merged.is_empty() {
        warn!("Merged table is empty, analytics will be blank");
    }

    let report = generate_analysis_report(&merged);
    write_analysis_report(&config.paths.processed_dir, &report)?;

    info!(
        rows = merged.len(),
        cities = report.overview.len(),
        "Analysis tables saved"
    );
    Ok(report)
}
