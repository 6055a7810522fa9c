//! Unified error handling for the fitness-viz library.
//!
//! Every fallible operation returns [`DashboardError`]. Most variants are
//! recoverable: an invalid or empty range is a local no-op, a malformed
//! geometry only drops the path of one card. Only a missing `metrics`
//! dataset is fatal to the dashboard.

use thiserror::Error;

/// Unified error type for fitness-viz operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    /// Start or end date missing when adding a trace
    #[error("Invalid date range: start '{start}', end '{end}' (both dates are required)")]
    InvalidRange { start: String, end: String },

    /// Aggregation produced no buckets for the requested range
    #[error("No data for '{label}' between {start} and {end}")]
    EmptyRange {
        label: String,
        start: String,
        end: String,
    },

    /// Route geometry could not be parsed as a line-string
    #[error("Activity '{activity_id}' has unusable geometry: {message}")]
    GeometryParse {
        activity_id: String,
        message: String,
    },

    /// A dataset (view) is missing entirely
    #[error("Dataset '{dataset}' is not available")]
    DatasetUnavailable { dataset: String },

    /// The query gateway failed
    #[error("Query failed: {message}")]
    Query { message: String },

    /// A returned row did not match the expected shape
    #[error("Could not decode row: {message}")]
    Decode { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl DashboardError {
    /// Whether this error should take the whole dashboard down.
    ///
    /// Only a missing required dataset is fatal; everything else is
    /// absorbed locally or surfaced once.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DashboardError::DatasetUnavailable { dataset } if dataset == "metrics")
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Decode {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for DashboardError {
    fn from(err: rusqlite::Error) -> Self {
        DashboardError::Query {
            message: err.to_string(),
        }
    }
}

/// Result type alias for fitness-viz operations.
pub type Result<T> = std::result::Result<T, DashboardError>;

/// Extension trait for converting Option to DashboardError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a dataset-unavailable error.
    fn ok_or_unavailable(self, dataset: &str) -> Result<T>;

    /// Convert Option to Result with a decode error.
    fn ok_or_decode(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_unavailable(self, dataset: &str) -> Result<T> {
        self.ok_or_else(|| DashboardError::DatasetUnavailable {
            dataset: dataset.to_string(),
        })
    }

    fn ok_or_decode(self, message: &str) -> Result<T> {
        self.ok_or_else(|| DashboardError::Decode {
            message: message.to_string(),
        })
    }
}
