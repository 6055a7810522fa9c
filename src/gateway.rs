//! Query gateway abstraction.
//!
//! The dashboard never talks to a database directly. It issues
//! parameterized SQL against two logical views through a [`QueryGateway`]:
//!
//! - `metrics(date, watts, heartrate, duration_seconds)` (required)
//! - `routes(activity_id, activity_name, date, geometry, watts_stream,
//!   hr_stream, avg_watts, avg_hr, duration_seconds)` (optional)
//!
//! Rows come back as JSON objects and are decoded into typed rows with
//! serde, which keeps the gateway independent of any particular engine.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// A single result row keyed by column name.
pub type Row = Map<String, Value>;

/// A bound query parameter. Values are never spliced into SQL text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Text(String),
    Real(f64),
    Integer(i64),
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Real(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Integer(value)
    }
}

/// Async access to the local dataset.
///
/// Execution is single-threaded and cooperative, so returned futures are
/// not required to be `Send`.
#[async_trait(?Send)]
pub trait QueryGateway {
    /// Run a query with positional `?N` parameters and return all rows.
    async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>>;

    /// Whether a view (or table) with this name exists.
    async fn has_view(&self, name: &str) -> Result<bool>;
}

/// Decode gateway rows into a typed row struct.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).map_err(Into::into))
        .collect()
}
