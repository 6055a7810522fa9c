//! # SQLite Gateway
//!
//! [`QueryGateway`] over a local SQLite file holding the `metrics` and
//! (optionally) `routes` tables or views.
//!
//! The dataset is produced by an external batch job; this module only
//! reads it. [`SqliteGateway::load_metrics`] and
//! [`SqliteGateway::load_routes`] exist so small datasets can be seeded for
//! tests and demos. Streams are stored as JSON text and geometry as WKT.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use log::{debug, info};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, ToSql};
use serde_json::{Number, Value};

use crate::error::Result;
use crate::gateway::{QueryGateway, Row, SqlParam};
use crate::{MetricSample, RouteSummary};

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            SqlParam::Real(value) => ToSqlOutput::Owned(SqlValue::Real(*value)),
            SqlParam::Integer(value) => ToSqlOutput::Owned(SqlValue::Integer(*value)),
        })
    }
}

/// Query gateway backed by a SQLite connection.
pub struct SqliteGateway {
    db: Connection,
}

impl SqliteGateway {
    /// Open an existing dataset file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Connection::open(path.as_ref())?;
        info!("[Sqlite] Opened dataset {}", path.as_ref().display());
        Ok(Self { db })
    }

    /// Create an empty in-memory dataset (for testing).
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            db: Connection::open_in_memory()?,
        })
    }

    /// Insert metric samples, creating the `metrics` table if needed.
    pub fn load_metrics(&self, samples: &[MetricSample]) -> Result<usize> {
        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                date TEXT NOT NULL,
                watts REAL NOT NULL,
                heartrate REAL NOT NULL,
                duration_seconds REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_metrics_date ON metrics(date);
            "#,
        )?;

        let tx = self.db.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO metrics (date, watts, heartrate, duration_seconds) VALUES (?, ?, ?, ?)",
            )?;
            for sample in samples {
                stmt.execute(params![
                    sample.date,
                    sample.watts,
                    sample.heartrate,
                    sample.duration_seconds
                ])?;
            }
        }
        tx.commit()?;

        debug!("[Sqlite] Loaded {} metric samples", samples.len());
        Ok(samples.len())
    }

    /// Insert route summaries, creating the `routes` table if needed.
    pub fn load_routes(&self, routes: &[RouteSummary]) -> Result<usize> {
        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS routes (
                activity_id TEXT PRIMARY KEY,
                activity_name TEXT,
                date TEXT NOT NULL,
                geometry TEXT,
                watts_stream TEXT,
                hr_stream TEXT,
                avg_watts REAL,
                avg_hr REAL,
                duration_seconds REAL
            );
            "#,
        )?;

        let tx = self.db.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO routes
                    (activity_id, activity_name, date, geometry, watts_stream, hr_stream,
                     avg_watts, avg_hr, duration_seconds)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for route in routes {
                let watts_json = serde_json::to_string(&route.watts_stream)?;
                let hr_json = serde_json::to_string(&route.hr_stream)?;
                stmt.execute(params![
                    route.activity_id,
                    route.activity_name,
                    route.date,
                    route.geometry,
                    watts_json,
                    hr_json,
                    route.avg_watts,
                    route.avg_hr,
                    route.duration_seconds
                ])?;
            }
        }
        tx.commit()?;

        debug!("[Sqlite] Loaded {} routes", routes.len());
        Ok(routes.len())
    }

    fn run_query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>> {
        let start = Instant::now();
        let mut stmt = self.db.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, column) in columns.iter().enumerate() {
                record.insert(column.clone(), json_value(row.get_ref(i)?));
            }
            out.push(record);
        }

        debug!(
            "[Sqlite] {} rows in {:?}",
            out.len(),
            start.elapsed()
        );
        Ok(out)
    }
}

/// Convert a SQLite value into its JSON counterpart. Blobs are not part of
/// either view and map to null.
fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(v) => Value::from(v),
        ValueRef::Real(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[async_trait(?Send)]
impl QueryGateway for SqliteGateway {
    async fn query(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>> {
        self.run_query(sql, params)
    }

    async fn has_view(&self, name: &str) -> Result<bool> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_value_conversion() {
        assert_eq!(json_value(ValueRef::Integer(5)), Value::from(5));
        assert_eq!(json_value(ValueRef::Real(1.5)), Value::from(1.5));
        assert_eq!(json_value(ValueRef::Real(f64::NAN)), Value::Null);
        assert_eq!(json_value(ValueRef::Text(b"2024-01-01")), Value::from("2024-01-01"));
        assert_eq!(json_value(ValueRef::Null), Value::Null);
    }

    #[tokio::test]
    async fn test_bound_parameters_are_not_interpreted() {
        let gateway = SqliteGateway::in_memory().unwrap();
        gateway
            .load_metrics(&[MetricSample::new("2024-01-01", 100.0, 120.0, 1.0)])
            .unwrap();

        // A value that would break an interpolated query is just a string here.
        let rows = gateway
            .query(
                "SELECT COUNT(*) AS n FROM metrics WHERE date = ?1",
                &[SqlParam::from("2024-01-01' OR '1'='1")],
            )
            .await
            .unwrap();
        assert_eq!(rows[0]["n"], Value::from(0));
        assert!(gateway.has_view("metrics").await.unwrap());
    }
}
