//! Power bucketing and curve aggregation.
//!
//! Two curves are computed for a date range and power ceiling:
//!
//! - **Efficiency**: mean heart rate per 5 W power bucket, using only
//!   samples with a plausible heart rate (40 < hr < 210).
//! - **Distribution**: hours spent in each 5 W power bucket, with no
//!   heart-rate filter (time-at-power does not depend on a valid HR).
//!
//! Because of the asymmetric filter the distribution curve can contain
//! buckets the efficiency curve lacks.
//!
//! ## Example
//! ```rust
//! use fitness_viz::aggregation::{bucket_of, TraceQuery};
//!
//! assert_eq!(bucket_of(152.7), 150);
//! let query = TraceQuery::new("2024-01-01", "2024-12-31", 400.0).unwrap();
//! assert_eq!(query.max_watts, 400.0);
//! ```

use std::time::Instant;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, OptionExt, Result};
use crate::gateway::{decode_rows, QueryGateway, SqlParam};

/// Width of a power bucket in watts.
pub const BUCKET_WIDTH: i64 = 5;

/// Heart rates at or below this are treated as sensor dropouts.
pub const HR_VALID_MIN: f64 = 40.0;

/// Heart rates at or above this are treated as sensor spikes.
pub const HR_VALID_MAX: f64 = 210.0;

// ?1 start, ?2 end, ?3 max watts, ?4 bucket width, ?5/?6 heart-rate band
//
// CAST truncates toward zero; the comparison term steps negative,
// non-multiple values down one bucket so the key is floor(watts / width).
const EFFICIENCY_SQL: &str = "\
    SELECT (CAST(watts / ?4 AS INTEGER) \
            - (watts < 0 AND CAST(watts / ?4 AS INTEGER) * ?4 != watts)) * ?4 AS bucket, \
           AVG(heartrate) AS avg_heartrate \
    FROM metrics \
    WHERE date BETWEEN ?1 AND ?2 AND watts <= ?3 AND heartrate > ?5 AND heartrate < ?6 \
    GROUP BY bucket \
    ORDER BY bucket";

const DISTRIBUTION_SQL: &str = "\
    SELECT (CAST(watts / ?4 AS INTEGER) \
            - (watts < 0 AND CAST(watts / ?4 AS INTEGER) * ?4 != watts)) * ?4 AS bucket, \
           SUM(duration_seconds) / 3600.0 AS hours \
    FROM metrics \
    WHERE date BETWEEN ?1 AND ?2 AND watts <= ?3 \
    GROUP BY bucket \
    ORDER BY bucket";

const BOUNDS_SQL: &str = "SELECT MIN(date) AS min, MAX(date) AS max FROM metrics";

/// Lower bound of the bucket a power value falls into.
pub fn bucket_of(watts: f64) -> i64 {
    (watts / BUCKET_WIDTH as f64).floor() as i64 * BUCKET_WIDTH
}

/// Mean heart rate within one power bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyPoint {
    pub bucket: i64,
    #[serde(alias = "avg_heartrate")]
    pub avg_heartrate: f64,
}

/// Time spent within one power bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionPoint {
    pub bucket: i64,
    pub hours: f64,
}

/// Both curves for one range/ceiling selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceCurves {
    pub efficiency: Vec<EfficiencyPoint>,
    pub distribution: Vec<DistributionPoint>,
}

/// Earliest and latest date present in `metrics`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBounds {
    pub min: String,
    pub max: String,
}

#[derive(Debug, Deserialize)]
struct BoundsRow {
    min: Option<String>,
    max: Option<String>,
}

/// A validated date range with a power ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceQuery {
    pub start: String,
    pub end: String,
    pub max_watts: f64,
}

impl TraceQuery {
    /// Build a query, failing with `InvalidRange` if either date is empty.
    pub fn new(start: &str, end: &str, max_watts: f64) -> Result<Self> {
        let (start, end) = (start.trim(), end.trim());
        if start.is_empty() || end.is_empty() {
            return Err(DashboardError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self {
            start: start.to_string(),
            end: end.to_string(),
            max_watts,
        })
    }

    fn range_params(&self) -> Vec<SqlParam> {
        vec![
            SqlParam::from(self.start.as_str()),
            SqlParam::from(self.end.as_str()),
            SqlParam::from(self.max_watts),
            SqlParam::from(BUCKET_WIDTH),
        ]
    }

    fn efficiency_params(&self) -> Vec<SqlParam> {
        let mut params = self.range_params();
        params.push(SqlParam::from(HR_VALID_MIN));
        params.push(SqlParam::from(HR_VALID_MAX));
        params
    }
}

/// Run the efficiency and distribution queries concurrently.
///
/// Both must succeed; a failure of either is returned and no partial
/// result is produced.
pub async fn fetch_curves<G: QueryGateway + ?Sized>(
    gateway: &G,
    query: &TraceQuery,
) -> Result<TraceCurves> {
    let start = Instant::now();
    let efficiency_params = query.efficiency_params();
    let distribution_params = query.range_params();

    let (efficiency_rows, distribution_rows) = futures::try_join!(
        gateway.query(EFFICIENCY_SQL, &efficiency_params),
        gateway.query(DISTRIBUTION_SQL, &distribution_params),
    )?;

    let curves = TraceCurves {
        efficiency: decode_rows(efficiency_rows)?,
        distribution: decode_rows(distribution_rows)?,
    };

    debug!(
        "[Aggregation] {}..{} <= {}W: {} efficiency / {} distribution buckets in {:?}",
        query.start,
        query.end,
        query.max_watts,
        curves.efficiency.len(),
        curves.distribution.len(),
        start.elapsed()
    );
    Ok(curves)
}

/// Date span of all `metrics` rows.
pub async fn fetch_bounds<G: QueryGateway + ?Sized>(gateway: &G) -> Result<DateBounds> {
    let rows: Vec<BoundsRow> = decode_rows(gateway.query(BOUNDS_SQL, &[]).await?)?;
    let row = rows.into_iter().next().ok_or_unavailable("metrics")?;
    match (row.min, row.max) {
        (Some(min), Some(max)) => Ok(DateBounds { min, max }),
        _ => Err(DashboardError::DatasetUnavailable {
            dataset: "metrics".to_string(),
        }),
    }
}

/// Whether bucket keys are unique and strictly ascending.
pub(crate) fn strictly_ascending<I: IntoIterator<Item = i64>>(buckets: I) -> bool {
    let mut previous: Option<i64> = None;
    for bucket in buckets {
        if previous.map_or(false, |p| bucket <= p) {
            return false;
        }
        previous = Some(bucket);
    }
    true
}
