use crate::analyzers::types::{AnalysisRow, CORRELATED, CorrelationMatrix, CorrelationRow};
use crate::analyzers::utility::pearson;

/// Pearson correlation between daily max temperature, min temperature and
/// demand, pooled across cities.
pub fn compute_correlation(rows: &[AnalysisRow]) -> CorrelationMatrix {
    let columns: [Vec<f64>; 3] = [
        rows.iter().map(|r| r.temp_max_f).collect(),
        rows.iter().map(|r| r.temp_min_f).collect(),
        rows.iter().map(|r| r.energy_mwh).collect(),
    ];

    let mut cells = [[None; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            cells[i][j] = pearson(&columns[i], &columns[j]);
        }
    }
    CorrelationMatrix { cells }
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = CORRELATED.iter().position(|v| *v == a)?;
        let j = CORRELATED.iter().position(|v| *v == b)?;
        self.cells[i][j]
    }

    pub fn csv_rows(&self) -> Vec<CorrelationRow> {
        CORRELATED
            .iter()
            .zip(&self.cells)
            .map(|(&variable, row)| CorrelationRow {
                variable,
                temp_max_f: row[0],
                temp_min_f: row[1],
                energy_mwh: row[2],
            })
            .collect()
    }
}
