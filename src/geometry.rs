//! Route geometry parsing and rendering backends.
//!
//! Routes arrive as line-strings of (longitude, latitude) points, either as
//! WKT (`LINESTRING (lon lat, ...)`) or as a GeoJSON `LineString`. Two
//! interchangeable backends turn a parsed line into something drawable:
//!
//! - [`StaticPathRenderer`]: fits the bounding box (plus padding) into a
//!   fixed viewport and emits an SVG path.
//! - [`MapViewRenderer`]: projects to Web Mercator and fits an interactive
//!   map view to the route, capped at a maximum zoom.

use std::f64::consts::PI;

use geo::{BoundingRect, Coord, LineString};
use serde::{Deserialize, Serialize};

use crate::config::{DashboardConfig, Viewport};
use crate::error::{DashboardError, Result};

/// Web Mercator is undefined at the poles; latitudes are clamped to this.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Pixel size of the world at zoom 0.
const TILE_SIZE: f64 = 256.0;

// ============================================================================
// Parsing
// ============================================================================

#[derive(Deserialize)]
struct GeoJsonGeometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<Vec<f64>>,
}

/// Parse route geometry into a line-string.
///
/// Anything that is not a line-string with at least two finite points is a
/// `GeometryParse` error.
pub fn parse_line_string(activity_id: &str, text: &str) -> Result<LineString<f64>> {
    let fail = |message: String| DashboardError::GeometryParse {
        activity_id: activity_id.to_string(),
        message,
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(fail("empty geometry".to_string()));
    }

    let coords = if text.starts_with('{') {
        parse_geojson(text).map_err(fail)?
    } else {
        parse_wkt(text).map_err(fail)?
    };

    if coords.len() < 2 {
        return Err(fail(format!("{} point(s), at least 2 required", coords.len())));
    }
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(fail("non-finite coordinate".to_string()));
    }
    Ok(LineString::new(coords))
}

fn parse_wkt(text: &str) -> std::result::Result<Vec<Coord<f64>>, String> {
    let upper = text.to_ascii_uppercase();
    let Some(rest) = upper.strip_prefix("LINESTRING") else {
        let kind = upper.split(|c: char| c == '(' || c.is_whitespace()).next().unwrap_or("");
        return Err(format!("expected LINESTRING, found {}", kind));
    };

    // Optional dimension tag (Z, M, ZM) before the coordinate list
    let rest = rest.trim_start();
    let rest = rest
        .strip_prefix("ZM")
        .or_else(|| rest.strip_prefix('Z'))
        .or_else(|| rest.strip_prefix('M'))
        .unwrap_or(rest)
        .trim();

    if rest == "EMPTY" {
        return Ok(Vec::new());
    }
    let body = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| "unbalanced parentheses".to_string())?;

    body.split(',')
        .map(|pair| {
            let mut values = pair.split_whitespace().map(str::parse::<f64>);
            match (values.next(), values.next()) {
                (Some(Ok(x)), Some(Ok(y))) => Ok(Coord { x, y }),
                _ => Err(format!("bad coordinate '{}'", pair.trim())),
            }
        })
        .collect()
}

fn parse_geojson(text: &str) -> std::result::Result<Vec<Coord<f64>>, String> {
    let geometry: GeoJsonGeometry = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if geometry.kind != "LineString" {
        return Err(format!("expected LineString, found {}", geometry.kind));
    }
    geometry
        .coordinates
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err("position with fewer than 2 values".to_string()),
        })
        .collect()
}

// ============================================================================
// Rendering backends
// ============================================================================

/// Route path fitted into a fixed viewport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathVisual {
    pub width: f64,
    pub height: f64,
    /// `[x, y]` in viewport coordinates (y grows downward)
    pub points: Vec<[f64; 2]>,
    /// SVG path data (`M x y L x y ...`)
    pub d: String,
}

/// Map view fitted to a route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub width: f64,
    pub height: f64,
    /// `[longitude, latitude]` of the view center
    pub center: [f64; 2],
    pub zoom: f64,
    /// `[x, y]` pixel positions of the route within the view
    pub points: Vec<[f64; 2]>,
}

/// What a backend produced for one route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GeometryVisual {
    Path(PathVisual),
    Map(MapView),
}

/// A way of turning route geometry into a visual.
///
/// Sampling and aggregation never depend on which backend is active.
pub trait GeometryRenderer: Send + Sync {
    /// Render one route. `None` when there is nothing to draw.
    fn render_geometry(&self, line: &LineString<f64>) -> Option<GeometryVisual>;

    /// Whether each record needs expensive surface setup, in which case the
    /// card renderer yields to the host between records.
    fn yields_between_records(&self) -> bool {
        false
    }
}

/// Normalized SVG path inside a fixed viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticPathRenderer {
    pub viewport: Viewport,
    /// Fraction of the bounding box added on each side of each axis
    pub padding: f64,
}

impl StaticPathRenderer {
    pub fn new(viewport: Viewport, padding: f64) -> Self {
        Self { viewport, padding }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.path_viewport, config.path_padding)
    }

    /// Map each point into the viewport with latitude increasing upward.
    pub fn normalize(&self, line: &LineString<f64>) -> Vec<[f64; 2]> {
        let Some(rect) = line.bounding_rect() else {
            return Vec::new();
        };
        let pad_x = rect.width() * self.padding;
        let pad_y = rect.height() * self.padding;
        let min_x = rect.min().x - pad_x;
        let min_y = rect.min().y - pad_y;
        let range_x = non_zero(rect.width() + 2.0 * pad_x);
        let range_y = non_zero(rect.height() + 2.0 * pad_y);

        line.coords()
            .map(|c| {
                [
                    (c.x - min_x) / range_x * self.viewport.width,
                    self.viewport.height - (c.y - min_y) / range_y * self.viewport.height,
                ]
            })
            .collect()
    }
}

impl GeometryRenderer for StaticPathRenderer {
    fn render_geometry(&self, line: &LineString<f64>) -> Option<GeometryVisual> {
        let points = self.normalize(line);
        if points.is_empty() {
            return None;
        }
        let d = svg_path(&points);
        Some(GeometryVisual::Path(PathVisual {
            width: self.viewport.width,
            height: self.viewport.height,
            points,
            d,
        }))
    }
}

/// Web Mercator view fitted to the route extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapViewRenderer {
    pub viewport: Viewport,
    pub padding_px: f64,
    pub max_zoom: f64,
}

impl MapViewRenderer {
    pub fn new(viewport: Viewport, padding_px: f64, max_zoom: f64) -> Self {
        Self {
            viewport,
            padding_px,
            max_zoom,
        }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.map_viewport, config.map_padding_px, config.map_max_zoom)
    }

    /// Zoom at which `extent` (in world units) fits into `available` pixels.
    fn fit_zoom(&self, extent: f64, available: f64) -> f64 {
        if extent <= 0.0 {
            return f64::INFINITY;
        }
        (available / (extent * TILE_SIZE)).log2()
    }
}

impl GeometryRenderer for MapViewRenderer {
    fn render_geometry(&self, line: &LineString<f64>) -> Option<GeometryVisual> {
        let projected: Vec<(f64, f64)> = line.coords().map(|c| mercator(*c)).collect();
        if projected.is_empty() {
            return None;
        }

        let (mut min_x, mut min_y) = (f64::MAX, f64::MAX);
        let (mut max_x, mut max_y) = (f64::MIN, f64::MIN);
        for &(x, y) in &projected {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let available_w = self.viewport.width - 2.0 * self.padding_px;
        let available_h = self.viewport.height - 2.0 * self.padding_px;
        let zoom = self
            .fit_zoom(max_x - min_x, available_w)
            .min(self.fit_zoom(max_y - min_y, available_h))
            .min(self.max_zoom)
            .max(0.0);

        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;
        let scale = TILE_SIZE * zoom.exp2();
        let points = projected
            .iter()
            .map(|&(x, y)| {
                [
                    (x - center_x) * scale + self.viewport.width / 2.0,
                    (y - center_y) * scale + self.viewport.height / 2.0,
                ]
            })
            .collect();

        Some(GeometryVisual::Map(MapView {
            width: self.viewport.width,
            height: self.viewport.height,
            center: inverse_mercator(center_x, center_y),
            zoom,
            points,
        }))
    }

    fn yields_between_records(&self) -> bool {
        true
    }
}

/// Web Mercator in world units: x and y in [0, 1], y grows southward.
fn mercator(c: Coord<f64>) -> (f64, f64) {
    let lat = c.y.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (c.x + 180.0) / 360.0;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;
    (x, y)
}

fn inverse_mercator(x: f64, y: f64) -> [f64; 2] {
    let lon = x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    [lon, lat]
}

fn non_zero(range: f64) -> f64 {
    if range == 0.0 {
        1.0
    } else {
        range
    }
}

fn svg_path(points: &[[f64; 2]]) -> String {
    points
        .iter()
        .enumerate()
        .map(|(i, [x, y])| format!("{}{:.2} {:.2}", if i == 0 { "M" } else { "L" }, x, y))
        .collect::<Vec<_>>()
        .join(" ")
}
