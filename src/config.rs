//! Pipeline configuration: city roster, quality thresholds, fetch tuning and
//! data directories.
//!
//! Everything is plain data passed into the entry points. Defaults reproduce
//! the fixed five-city setup; a JSON file may override any section:
//!
//! ```json
//! {
//!   "thresholds": { "outlier_max_f": 125.0, "outlier_min_f": -40.0, "freshness_days": 3 },
//!   "fetch": { "days": 30 }
//! }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// One city tracked by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
    /// NOAA GHCND station id, e.g. `GHCND:USW00094728`.
    pub noaa_station: String,
    /// EIA balancing-authority respondent code, e.g. `NYIS`.
    pub eia_region: String,
    /// EIA reporting timezone used to pick one daily value per date.
    #[serde(default = "default_eia_timezone")]
    pub eia_timezone: String,
}

fn default_eia_timezone() -> String {
    "Pacific".to_string()
}

impl City {
    fn new(id: &str, name: &str, noaa_station: &str, eia_region: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            noaa_station: noaa_station.to_string(),
            eia_region: eia_region.to_string(),
            eia_timezone: default_eia_timezone(),
        }
    }
}

/// Largest accepted `freshness_days`.
pub const MAX_FRESHNESS_DAYS: i64 = 3650;

/// Largest accepted fetch window, in days.
pub const MAX_FETCH_DAYS: u32 = 3650;

/// Bounds used by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub outlier_max_f: f64,
    pub outlier_min_f: f64,
    pub freshness_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            outlier_max_f: 130.0,
            outlier_min_f: -50.0,
            freshness_days: 2,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Written so that NaN bounds are rejected too.
        if !(self.outlier_max_f > self.outlier_min_f) {
            return Err(ConfigError::InvalidThresholds {
                max: self.outlier_max_f,
                min: self.outlier_min_f,
            });
        }
        if self.freshness_days < 0 {
            return Err(ConfigError::NegativeFreshness(self.freshness_days));
        }
        if self.freshness_days > MAX_FRESHNESS_DAYS {
            return Err(ConfigError::FreshnessTooLarge {
                value: self.freshness_days,
                max: MAX_FRESHNESS_DAYS,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Number of most recent days kept per city.
    pub days: u32,
    pub max_retries: u32,
    pub backoff_secs: u64,
    pub timeout_secs: u64,
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days == 0 || self.days > MAX_FETCH_DAYS {
            return Err(ConfigError::FetchDaysOutOfRange {
                value: self.days,
                max: MAX_FETCH_DAYS,
            });
        }
        Ok(())
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            days: 90,
            max_retries: 3,
            backoff_secs: 1,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
        }
    }
}

impl DataPaths {
    pub fn weather_file(&self, city_id: &str, days: u32) -> PathBuf {
        self.raw_dir
            .join("weather")
            .join(format!("{city_id}_weather_{days}_days.csv"))
    }

    pub fn energy_file(&self, city_id: &str, days: u32) -> PathBuf {
        self.raw_dir
            .join("energy")
            .join(format!("{city_id}_energy_{days}_days.csv"))
    }

    pub fn cleaned_file(&self, city_id: &str) -> PathBuf {
        self.processed_dir.join(format!("{city_id}_cleaned.csv"))
    }

    pub fn merged_file(&self) -> PathBuf {
        self.processed_dir.join("merged_data.csv")
    }

    pub fn quality_report_file(&self) -> PathBuf {
        self.processed_dir.join("data_quality_report.csv")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cities: Vec<City>,
    pub thresholds: Thresholds,
    pub fetch: FetchConfig,
    pub paths: DataPaths,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cities: vec![
                City::new("new_york", "New York", "GHCND:USW00094728", "NYIS"),
                City::new("chicago", "Chicago", "GHCND:USW00094846", "PJM"),
                City::new("houston", "Houston", "GHCND:USW00012960", "ERCO"),
                City::new("phoenix", "Phoenix", "GHCND:USW00023183", "AZPS"),
                City::new("seattle", "Seattle", "GHCND:USW00024233", "SCL"),
            ],
            thresholds: Thresholds::default(),
            fetch: FetchConfig::default(),
            paths: DataPaths::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads the config from `path`, or from `ETL_CONFIG` when no path is
    /// given. With neither, the built-in defaults are used.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => Some(p.to_string()),
            None => std::env::var("ETL_CONFIG").ok(),
        };

        let cfg = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cities.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }
        let mut seen = HashSet::new();
        for city in &self.cities {
            if !seen.insert(city.id.as_str()) {
                return Err(ConfigError::DuplicateCity(city.id.clone()));
            }
        }
        self.thresholds.validate()?;
        self.fetch.validate()
    }

    pub fn city(&self, id: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.id == id)
    }
}

/// API credentials for the upstream data providers, read from the
/// environment (after `.env` has been loaded).
#[derive(Clone)]
pub struct ApiKeys {
    pub noaa: String,
    pub eia: String,
}

impl ApiKeys {
    pub fn from_env() -> anyhow::Result<Self> {
        let noaa = std::env::var("NOAA_API_KEY")
            .map_err(|_| anyhow::anyhow!("NOAA_API_KEY must be set"))?;
        let eia =
            std::env::var("EIA_API_KEY").map_err(|_| anyhow::anyhow!("EIA_API_KEY must be set"))?;
        Ok(Self { noaa, eia })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_roster_is_valid() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.cities.len(), 5);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.city("phoenix").unwrap().eia_region, "AZPS");
    }

    #[test]
    fn test_empty_roster_rejected() {
        let cfg = PipelineConfig {
            cities: vec![],
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyRoster)));
    }

    #[test]
    fn test_duplicate_city_rejected() {
        let mut cfg = PipelineConfig::default();
        let dup = cfg.cities[0].clone();
        cfg.cities.push(dup);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DuplicateCity(id)) if id == "new_york"
        ));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let t = Thresholds {
            outlier_max_f: -60.0,
            outlier_min_f: -50.0,
            freshness_days: 2,
        };
        assert!(matches!(
            t.validate(),
            Err(ConfigError::InvalidThresholds { .. })
        ));
    }

    #[test]
    fn test_negative_freshness_rejected() {
        let t = Thresholds {
            freshness_days: -1,
            ..Default::default()
        };
        assert!(matches!(t.validate(), Err(ConfigError::NegativeFreshness(-1))));
    }

    #[test]
    fn test_zero_freshness_allowed() {
        let t = Thresholds {
            freshness_days: 0,
            ..Default::default()
        };
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_huge_freshness_rejected() {
        let t = Thresholds {
            freshness_days: 200_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(
            t.validate(),
            Err(ConfigError::FreshnessTooLarge { max: MAX_FRESHNESS_DAYS, .. })
        ));

        let at_limit = Thresholds {
            freshness_days: MAX_FRESHNESS_DAYS,
            ..Default::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_fetch_days_bounds() {
        let mut cfg = PipelineConfig::default();
        cfg.fetch.days = u32::MAX;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::FetchDaysOutOfRange { value: u32::MAX, .. })
        ));

        cfg.fetch.days = 0;
        assert!(cfg.validate().is_err());

        cfg.fetch.days = MAX_FETCH_DAYS;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "thresholds": {{ "freshness_days": 5 }} }}"#).unwrap();

        let cfg = PipelineConfig::load(file.path().to_str()).unwrap();
        assert_eq!(cfg.thresholds.freshness_days, 5);
        assert_eq!(cfg.thresholds.outlier_max_f, 130.0);
        assert_eq!(cfg.cities.len(), 5);
        assert_eq!(cfg.fetch.days, 90);
    }

    #[test]
    fn test_city_timezone_defaults_to_pacific() {
        let json = r#"{ "id": "x", "name": "X", "noaa_station": "S", "eia_region": "R" }"#;
        let city: City = serde_json::from_str(json).unwrap();
        assert_eq!(city.eia_timezone, "Pacific");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PipelineConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_paths_layout() {
        let paths = DataPaths::default();
        assert_eq!(
            paths.weather_file("phoenix", 90),
            PathBuf::from("data/raw/weather/phoenix_weather_90_days.csv")
        );
        assert_eq!(
            paths.cleaned_file("phoenix"),
            PathBuf::from("data/processed/phoenix_cleaned.csv")
        );
    }
}
