//! Activity card rendering.
//!
//! For the most recent routes, each card gets:
//! - the route path from the active [`GeometryRenderer`] (omitted when the
//!   geometry is malformed)
//! - power and heart-rate sparklines from stride-decimated streams
//! - rounded summary stats
//!
//! A missing `routes` dataset is not an error here: it just means there are
//! no cards to show.

use log::{debug, warn};
use serde::Serialize;

use crate::config::{DashboardConfig, Viewport};
use crate::error::Result;
use crate::gateway::{decode_rows, QueryGateway, SqlParam};
use crate::geometry::{parse_line_string, GeometryRenderer, GeometryVisual};
use crate::sampling::{build_sparkline, downsample, Sparkline};
use crate::RouteSummary;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Default number of cards.
pub const DEFAULT_CARD_LIMIT: usize = 25;

const RECENT_ROUTES_SQL: &str = "\
    SELECT activity_id, activity_name, date, geometry, watts_stream, hr_stream, \
           avg_watts, avg_hr, duration_seconds \
    FROM routes \
    ORDER BY date DESC \
    LIMIT ?1";

/// Rounded per-activity numbers shown on a card.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStats {
    pub avg_watts: Option<i64>,
    pub avg_hr: Option<i64>,
    /// Duration in hours, one decimal
    pub hours: f64,
}

impl CardStats {
    pub fn from_route(route: &RouteSummary) -> Self {
        Self {
            avg_watts: route.avg_watts.filter(|v| v.is_finite()).map(|v| v.round() as i64),
            avg_hr: route.avg_hr.filter(|v| v.is_finite()).map(|v| v.round() as i64),
            hours: (route.duration_seconds / 3600.0 * 10.0).round() / 10.0,
        }
    }
}

/// Compact visual summary of one activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualCard {
    pub activity_id: String,
    pub activity_name: String,
    pub date: String,
    pub path: Option<GeometryVisual>,
    pub power_sparkline: Sparkline,
    pub hr_sparkline: Sparkline,
    pub stats: CardStats,
}

/// Sparkline sizing for cards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardLayout {
    /// Target sample count after decimation
    pub sparkline_points: usize,
    pub sparkline_size: Viewport,
}

impl CardLayout {
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self {
            sparkline_points: config.sparkline_points,
            sparkline_size: config.sparkline_size,
        }
    }
}

impl Default for CardLayout {
    fn default() -> Self {
        Self::from_config(&DashboardConfig::default())
    }
}

/// Build one card. Never fails: a bad geometry only drops the path.
pub fn build_card(
    route: &RouteSummary,
    renderer: &dyn GeometryRenderer,
    layout: &CardLayout,
) -> VisualCard {
    let path = match parse_line_string(&route.activity_id, &route.geometry) {
        Ok(line) => renderer.render_geometry(&line),
        Err(e) => {
            warn!("[Cards] {}", e);
            None
        }
    };

    let sparkline = |stream: &[f64]| {
        build_sparkline(
            &downsample(stream, layout.sparkline_points),
            layout.sparkline_size.width,
            layout.sparkline_size.height,
        )
    };

    VisualCard {
        activity_id: route.activity_id.clone(),
        activity_name: route.activity_name.clone(),
        date: route.date.clone(),
        path,
        power_sparkline: sparkline(&route.watts_stream),
        hr_sparkline: sparkline(&route.hr_stream),
        stats: CardStats::from_route(route),
    }
}

/// Build cards for routes whose renderer needs no per-record yielding.
#[cfg(feature = "parallel")]
pub fn build_cards_batch(
    routes: &[RouteSummary],
    renderer: &dyn GeometryRenderer,
    layout: &CardLayout,
) -> Vec<VisualCard> {
    routes
        .par_iter()
        .map(|route| build_card(route, renderer, layout))
        .collect()
}

/// Build cards for routes whose renderer needs no per-record yielding.
#[cfg(not(feature = "parallel"))]
pub fn build_cards_batch(
    routes: &[RouteSummary],
    renderer: &dyn GeometryRenderer,
    layout: &CardLayout,
) -> Vec<VisualCard> {
    routes
        .iter()
        .map(|route| build_card(route, renderer, layout))
        .collect()
}

/// The `limit` most recent routes, newest first.
pub async fn fetch_recent_routes<G: QueryGateway + ?Sized>(
    gateway: &G,
    limit: usize,
) -> Result<Vec<RouteSummary>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = gateway
        .query(RECENT_ROUTES_SQL, &[SqlParam::from(limit)])
        .await?;
    decode_rows(rows)
}

/// Render cards for the most recent `limit` routes.
///
/// Returns no cards when the `routes` dataset is absent. With a renderer
/// that sets up a surface per record, control is yielded to the host after
/// each card.
pub async fn render_cards<G: QueryGateway + ?Sized>(
    gateway: &G,
    renderer: &dyn GeometryRenderer,
    layout: &CardLayout,
    limit: usize,
) -> Result<Vec<VisualCard>> {
    if !gateway.has_view("routes").await? {
        warn!("[Cards] No route data");
        return Ok(Vec::new());
    }

    let routes = fetch_recent_routes(gateway, limit).await?;
    debug!("[Cards] Rendering {} routes", routes.len());

    if !renderer.yields_between_records() {
        return Ok(build_cards_batch(&routes, renderer, layout));
    }

    let mut cards = Vec::with_capacity(routes.len());
    for route in &routes {
        cards.push(build_card(route, renderer, layout));
        tokio::task::yield_now().await;
    }
    Ok(cards)
}
