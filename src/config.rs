//! Dashboard configuration.
//!
//! All defaults that the UI used to repeat at each call site live here and
//! are consumed once when the [`Dashboard`](crate::Dashboard) is built.

use serde::{Deserialize, Serialize};

use crate::cards::DEFAULT_CARD_LIMIT;
use crate::error::{DashboardError, Result};
use crate::sampling::DEFAULT_TARGET_POINTS;

/// A fixed-size drawing surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Which backend draws route geometry on activity cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Normalized SVG path inside a fixed viewport
    #[default]
    Static,
    /// Web Mercator projection fitted to an interactive map view
    Map,
}

/// Configuration for trace aggregation and card rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Power ceiling (watts) used when a trace is added without one.
    /// Default: 400
    pub default_max_watts: f64,

    /// Number of calendar years added by the recent-years preset.
    /// Default: 3
    pub default_trace_years: u32,

    /// Number of most recent activities rendered as cards.
    /// Default: 25
    pub card_limit: usize,

    /// Target sample count after stride decimation of a stream.
    /// Default: 150
    pub sparkline_points: usize,

    /// Sparkline drawing area. Default: 120x30
    pub sparkline_size: Viewport,

    /// Static route path drawing area. Default: 100x100
    pub path_viewport: Viewport,

    /// Fractional padding added to each axis of the route bounding box.
    /// Default: 0.05 (5%)
    pub path_padding: f64,

    /// Interactive map view size. Default: 300x200
    pub map_viewport: Viewport,

    /// Pixel padding kept around the route when fitting the map view.
    /// Default: 20
    pub map_padding_px: f64,

    /// Zoom cap so very short routes are not over-zoomed. Default: 16
    pub map_max_zoom: f64,

    /// Geometry backend for activity cards. Default: static
    pub renderer: RendererKind,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_max_watts: 400.0,
            default_trace_years: 3,
            card_limit: DEFAULT_CARD_LIMIT,
            sparkline_points: DEFAULT_TARGET_POINTS,
            sparkline_size: Viewport::new(120.0, 30.0),
            path_viewport: Viewport::new(100.0, 100.0),
            path_padding: 0.05,
            map_viewport: Viewport::new(300.0, 200.0),
            map_padding_px: 20.0,
            map_max_zoom: 16.0,
            renderer: RendererKind::Static,
        }
    }
}

impl DashboardConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| DashboardError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every field is usable.
    pub fn validate(&self) -> Result<()> {
        let fail = |message: &str| -> Result<()> {
            Err(DashboardError::Config {
                message: message.to_string(),
            })
        };

        if !(self.default_max_watts.is_finite() && self.default_max_watts > 0.0) {
            return fail("default_max_watts must be a positive number");
        }
        if self.sparkline_points == 0 {
            return fail("sparkline_points must be at least 1");
        }
        if !self.sparkline_size.is_valid()
            || !self.path_viewport.is_valid()
            || !self.map_viewport.is_valid()
        {
            return fail("viewports must have a positive width and height");
        }
        if !(0.0..1.0).contains(&self.path_padding) {
            return fail("path_padding must be in [0, 1)");
        }
        if self.map_padding_px < 0.0
            || self.map_padding_px * 2.0 >= self.map_viewport.width.min(self.map_viewport.height)
        {
            return fail("map_padding_px must leave room inside the map viewport");
        }
        if !(self.map_max_zoom.is_finite() && self.map_max_zoom >= 0.0) {
            return fail("map_max_zoom must be non-negative");
        }
        Ok(())
    }
}
