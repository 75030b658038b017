//! Typed errors for the processing core and its collaborators.
//!
//! Quality problems in the data are never errors: they become verdict tags.
//! The types here cover structural failures only.

use thiserror::Error;

/// A raw row that cannot be placed in any series.
///
/// These are excluded from processing and counted, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedObservation {
    #[error("row has no date")]
    MissingDate,
    #[error("row has no city_id")]
    MissingCityId,
    #[error("unparseable date '{0}'")]
    InvalidDate(String),
    #[error("row belongs to city '{found}', expected '{expected}'")]
    CityMismatch { expected: String, found: String },
    #[error("unreadable row: {0}")]
    Unreadable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("city roster is empty")]
    EmptyRoster,
    #[error("city '{0}' appears more than once in the roster")]
    DuplicateCity(String),
    #[error("outlier_max_f ({max}) must be greater than outlier_min_f ({min})")]
    InvalidThresholds { max: f64, min: f64 },
    #[error("freshness_days must be >= 0, got {0}")]
    NegativeFreshness(i64),
    #[error("freshness_days must be at most {max}, got {value}")]
    FreshnessTooLarge { value: i64, max: i64 },
    #[error("fetch days must be between 1 and {max}, got {value}")]
    FetchDaysOutOfRange { value: u32, max: u32 },
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no cities to process")]
    NoCities,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },
    /// Built only through `From`, which strips the request URL so query
    /// credentials never reach a log line.
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("invalid auth header: {0}")]
    Header(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(e.without_url())
    }
}

impl FetchError {
    /// Server errors and transport failures are worth another attempt;
    /// client errors and bad payloads are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => (500..600).contains(status),
            FetchError::Transport(_) => true,
            FetchError::Url(_) | FetchError::Header(_) | FetchError::Decode(_) => false,
        }
    }
}
