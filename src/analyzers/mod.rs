//! Descriptive analytics over the merged table.
//!
//! Correlations between temperature and demand, weekday/weekend and
//! seasonal demand summaries, a latest-day overview per city, and a
//! temperature-band by weekday heatmap. Results are written as CSV next to
//! the processed data.

pub mod analyzer;
pub mod correlation;
pub mod overview;
pub mod patterns;
pub mod types;
pub mod utility;
