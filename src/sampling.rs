//! Stream downsampling and sparklines.
//!
//! Activity streams are thousands of 1 Hz samples long; cards only need a
//! rough shape. Streams are first stride-decimated to about
//! [`DEFAULT_TARGET_POINTS`] samples, then scaled to their own min/max.

use serde::Serialize;

/// Default sample count kept after decimation.
pub const DEFAULT_TARGET_POINTS: usize = 150;

/// Keep every `ceil(len / target)`-th sample.
///
/// Streams no longer than `target` are returned unchanged. This is stride
/// decimation, not averaging: peaks between kept samples are lost.
pub fn downsample<T: Copy>(stream: &[T], target: usize) -> Vec<T> {
    if target == 0 || stream.len() <= target {
        return stream.to_vec();
    }
    let step = stream.len().div_ceil(target);
    stream.iter().step_by(step).copied().collect()
}

/// An axis-free line scaled to its own range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sparkline {
    pub width: f64,
    pub height: f64,
    /// `[x, y]` in drawing coordinates (y grows downward)
    pub points: Vec<[f64; 2]>,
}

impl Sparkline {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// SVG `polyline` points attribute, e.g. `"0.00,30.00 60.00,0.00"`.
    pub fn to_svg_points(&self) -> String {
        self.points
            .iter()
            .map(|[x, y]| format!("{:.2},{:.2}", x, y))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Map values onto a `width` x `height` area.
///
/// Higher values are drawn higher (smaller y). A constant stream has a zero
/// range; a range of 1 is substituted so it renders as a flat line on the
/// baseline.
pub fn build_sparkline(values: &[f64], width: f64, height: f64) -> Sparkline {
    if values.is_empty() {
        return Sparkline {
            width,
            height,
            points: Vec::new(),
        };
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = if max - min == 0.0 { 1.0 } else { max - min };
    let x_step = if values.len() > 1 {
        width / (values.len() - 1) as f64
    } else {
        0.0
    };

    let points = values
        .iter()
        .enumerate()
        .map(|(i, &v)| [i as f64 * x_step, height - (v - min) / range * height])
        .collect();

    Sparkline {
        width,
        height,
        points,
    }
}
