//! # Fitness Viz
//!
//! Client-side analytics for personal fitness sensor data: power, heart
//! rate and route geometry.
//!
//! This library provides:
//! - Binned efficiency (heart rate per power bucket) and time-at-power
//!   curves, computed by parameterized queries against a local dataset
//! - An ordered, colored overlay of those curves for charting
//! - Compact activity cards: normalized route paths plus power and heart
//!   rate sparklines
//!
//! ## Features
//!
//! - **`sqlite`** (default) - SQLite-backed [`QueryGateway`]
//! - **`parallel`** - Prepare cards in parallel with rayon
//! - **`cli`** - `fitness-viz` command line front end
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "sqlite")]
//! # async fn run() -> fitness_viz::Result<()> {
//! use fitness_viz::{Dashboard, DashboardConfig, SqliteGateway};
//!
//! let gateway = SqliteGateway::open("data/fitness.db")?;
//! let dashboard = Dashboard::open(gateway, DashboardConfig::default()).await?;
//!
//! let bounds = dashboard.bounds().await?;
//! dashboard
//!     .add_trace("All time", &bounds.min, &bounds.max, None, false)
//!     .await?;
//!
//! let cards = dashboard.render_cards(None).await;
//! println!("{} traces, {} cards", dashboard.trace_count(), cards.len());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// Unified error handling
pub mod error;
pub use error::{DashboardError, OptionExt, Result};

// Configuration with enumerated defaults
pub mod config;
pub use config::{DashboardConfig, RendererKind, Viewport};

// Query gateway abstraction over the `metrics` and `routes` views
pub mod gateway;
pub use gateway::{decode_rows, QueryGateway, Row, SqlParam};

// SQLite implementation of the gateway
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteGateway;

// Power bucketing and curve aggregation
pub mod aggregation;
pub use aggregation::{
    bucket_of, DateBounds, DistributionPoint, EfficiencyPoint, TraceCurves, TraceQuery,
    BUCKET_WIDTH,
};

// Palette cycling for trace colors
pub mod palette;
pub use palette::{color_for_index, PALETTE};

// Ordered trace overlay with chart re-render
pub mod store;
pub use store::{ChartSeries, ChartSink, LogChartSink, Trace, TraceOverlayStore};

// Stride decimation and sparklines
pub mod sampling;
pub use sampling::{build_sparkline, downsample, Sparkline};

// Route geometry parsing and the two rendering backends
pub mod geometry;
pub use geometry::{
    parse_line_string, GeometryRenderer, GeometryVisual, MapView, MapViewRenderer, PathVisual,
    StaticPathRenderer,
};

// Activity card rendering
pub mod cards;
pub use cards::{CardLayout, CardStats, VisualCard};

// The owned dashboard state (replaces module-level globals)
pub mod dashboard;
pub use dashboard::{Dashboard, LogNotifier, Notifier, TraceAdded};

// ============================================================================
// Core Types
// ============================================================================

/// One row of the `metrics` view.
///
/// Dates are ISO 8601 calendar dates (`YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub date: String,
    pub watts: f64,
    pub heartrate: f64,
    pub duration_seconds: f64,
}

impl MetricSample {
    pub fn new(date: &str, watts: f64, heartrate: f64, duration_seconds: f64) -> Self {
        Self {
            date: date.to_string(),
            watts,
            heartrate,
            duration_seconds,
        }
    }
}

/// One row of the `routes` view: a per-activity summary.
///
/// `geometry` is kept as delivered (WKT `LINESTRING` text or a GeoJSON
/// `LineString`); it is parsed when a card is rendered so that a malformed
/// value only affects that one card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub activity_id: String,
    #[serde(default)]
    pub activity_name: String,
    pub date: String,
    #[serde(default, deserialize_with = "geometry_text")]
    pub geometry: String,
    #[serde(default, deserialize_with = "numeric_stream")]
    pub watts_stream: Vec<f64>,
    #[serde(default, deserialize_with = "numeric_stream")]
    pub hr_stream: Vec<f64>,
    #[serde(default)]
    pub avg_watts: Option<f64>,
    #[serde(default)]
    pub avg_hr: Option<f64>,
    #[serde(default)]
    pub duration_seconds: f64,
}

/// Accept geometry either as text or as an inline JSON object.
fn geometry_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

/// Accept a stream as a JSON array or JSON text. Missing readings (`null`)
/// are dropped.
fn numeric_stream<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<f64>, D::Error> {
    use serde::de::Error;

    let items: Vec<Option<f64>> = match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::String(text) if text.trim().is_empty() => Vec::new(),
        Value::String(text) => serde_json::from_str(&text).map_err(D::Error::custom)?,
        other => serde_json::from_value(other).map_err(D::Error::custom)?,
    };
    Ok(items.into_iter().flatten().collect())
}

// ============================================================================
// Tests
// ============================================================================
