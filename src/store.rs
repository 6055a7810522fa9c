//! # Trace Overlay Store
//!
//! Ordered collection of [`Trace`]s drawn on top of each other in two
//! charts (efficiency and distribution). Insertion order is also the legend
//! order and the palette index.
//!
//! The store only supports append and a full clear. Every mutation pushes
//! the complete, ordered series list to the [`ChartSink`].
//!
//! The store also owns the selection generation: a counter bumped by every
//! logical selection action (including clear). Aggregations capture it when
//! they start and are discarded if it has moved on by the time they finish.

use log::{debug, info};
use serde::Serialize;

use crate::aggregation::{strictly_ascending, DistributionPoint, EfficiencyPoint, TraceCurves};
use crate::palette::color_for_index;

/// One named, colored pair of curves.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub label: String,
    pub color: &'static str,
    pub efficiency: Vec<EfficiencyPoint>,
    pub distribution: Vec<DistributionPoint>,
}

/// One line of one chart, as handed to the chart widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub label: String,
    pub color: &'static str,
    /// `[bucket watts, value]` pairs in ascending bucket order
    pub points: Vec<[f64; 2]>,
}

/// Rendering target for the two overlay charts.
///
/// Called while the store is being mutated; implementations must not call
/// back into the dashboard.
pub trait ChartSink {
    fn render(&mut self, efficiency: &[ChartSeries], distribution: &[ChartSeries]);
}

/// Sink that only logs what would be drawn.
#[derive(Debug, Default)]
pub struct LogChartSink;

impl ChartSink for LogChartSink {
    fn render(&mut self, efficiency: &[ChartSeries], distribution: &[ChartSeries]) {
        debug!(
            "[Charts] Rendering {} efficiency / {} distribution series",
            efficiency.len(),
            distribution.len()
        );
    }
}

/// Ordered overlay of traces.
pub struct TraceOverlayStore {
    traces: Vec<Trace>,
    generation: u64,
    sink: Box<dyn ChartSink>,
}

impl TraceOverlayStore {
    /// Create an empty store that renders into `sink`.
    pub fn new(sink: Box<dyn ChartSink>) -> Self {
        Self {
            traces: Vec::new(),
            generation: 0,
            sink,
        }
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Current selection generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a new logical selection. Results from older generations will
    /// be discarded.
    pub fn begin_selection(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Append a trace at the tail and re-render. Returns its index.
    ///
    /// The color is `PALETTE[len % 8]` at the time of the call.
    pub fn append(&mut self, label: &str, curves: TraceCurves) -> usize {
        debug_assert!(strictly_ascending(curves.efficiency.iter().map(|p| p.bucket)));
        debug_assert!(strictly_ascending(curves.distribution.iter().map(|p| p.bucket)));

        let index = self.traces.len();
        let color = color_for_index(index);
        self.traces.push(Trace {
            label: label.to_string(),
            color,
            efficiency: curves.efficiency,
            distribution: curves.distribution,
        });
        info!("[Traces] Added '{}' as trace {} ({})", label, index, color);
        self.render();
        index
    }

    /// Append only if no new selection started since `generation`.
    pub fn append_if_current(
        &mut self,
        generation: u64,
        label: &str,
        curves: TraceCurves,
    ) -> Option<usize> {
        if generation != self.generation {
            debug!(
                "[Traces] Discarding '{}' from generation {} (current {})",
                label, generation, self.generation
            );
            return None;
        }
        Some(self.append(label, curves))
    }

    /// Remove every trace and re-render. Also starts a new selection, so
    /// aggregations still in flight will not repopulate the charts.
    pub fn clear(&mut self) {
        let removed = self.traces.len();
        self.traces.clear();
        self.generation += 1;
        info!("[Traces] Cleared {} traces", removed);
        self.render();
    }

    /// Efficiency chart series: bucket → mean heart rate.
    pub fn efficiency_series(&self) -> Vec<ChartSeries> {
        self.traces
            .iter()
            .map(|t| ChartSeries {
                label: t.label.clone(),
                color: t.color,
                points: t
                    .efficiency
                    .iter()
                    .map(|p| [p.bucket as f64, p.avg_heartrate])
                    .collect(),
            })
            .collect()
    }

    /// Distribution chart series: bucket → hours.
    pub fn distribution_series(&self) -> Vec<ChartSeries> {
        self.traces
            .iter()
            .map(|t| ChartSeries {
                label: t.label.clone(),
                color: t.color,
                points: t
                    .distribution
                    .iter()
                    .map(|p| [p.bucket as f64, p.hours])
                    .collect(),
            })
            .collect()
    }

    /// All traces as JSON (for chart widgets living outside Rust).
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.traces).unwrap_or_else(|_| "[]".to_string())
    }

    fn render(&mut self) {
        let efficiency = self.efficiency_series();
        let distribution = self.distribution_series();
        self.sink.render(&efficiency, &distribution);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::PALETTE;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Renders = Rc<RefCell<Vec<(Vec<ChartSeries>, Vec<ChartSeries>)>>>;

    struct RecordingSink(Renders);

    impl ChartSink for RecordingSink {
        fn render(&mut self, efficiency: &[ChartSeries], distribution: &[ChartSeries]) {
            self.0
                .borrow_mut()
                .push((efficiency.to_vec(), distribution.to_vec()));
        }
    }

    fn recording_store() -> (TraceOverlayStore, Renders) {
        let renders: Renders = Rc::new(RefCell::new(Vec::new()));
        let store = TraceOverlayStore::new(Box::new(RecordingSink(renders.clone())));
        (store, renders)
    }

    fn curves(buckets: &[i64]) -> TraceCurves {
        TraceCurves {
            efficiency: buckets
                .iter()
                .map(|&b| EfficiencyPoint {
                    bucket: b,
                    avg_heartrate: 100.0 + b as f64 / 5.0,
                })
                .collect(),
            distribution: buckets
                .iter()
                .map(|&b| DistributionPoint {
                    bucket: b,
                    hours: 0.5,
                })
                .collect(),
        }
    }

    #[test]
    fn test_append_assigns_palette_in_order() {
        let (mut store, _) = recording_store();
        for k in 0..10 {
            let index = store.append(&format!("t{}", k), curves(&[100, 105]));
            assert_eq!(index, k);
            assert_eq!(store.traces()[k].color, PALETTE[k % 8]);
        }
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_clear_resets_color_cycle() {
        let (mut store, _) = recording_store();
        store.append("a", curves(&[100]));
        store.append("b", curves(&[100]));
        store.clear();
        assert!(store.is_empty());
        store.append("c", curves(&[100]));
        assert_eq!(store.traces()[0].color, PALETTE[0]);
    }

    #[test]
    fn test_every_mutation_renders_full_list() {
        let (mut store, renders) = recording_store();
        store.append("2023", curves(&[100, 105]));
        store.append("2024", curves(&[110]));
        store.clear();

        let renders = renders.borrow();
        assert_eq!(renders.len(), 3);
        let (efficiency, distribution) = &renders[1];
        assert_eq!(efficiency.len(), 2);
        assert_eq!(distribution.len(), 2);
        assert_eq!(efficiency[1].label, "2024");
        assert_eq!(efficiency[1].color, distribution[1].color);
        assert_eq!(efficiency[0].points[0], [100.0, 120.0]);
        assert!(renders[2].0.is_empty());
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let (mut store, renders) = recording_store();
        let generation = store.generation();
        store.begin_selection();
        assert_eq!(store.append_if_current(generation, "old", curves(&[100])), None);
        assert!(store.is_empty());
        assert!(renders.borrow().is_empty());

        let current = store.generation();
        assert_eq!(store.append_if_current(current, "new", curves(&[100])), Some(0));
    }

    #[test]
    fn test_clear_starts_new_generation() {
        let (mut store, _) = recording_store();
        let before = store.generation();
        store.clear();
        assert!(store.generation() > before);
    }

    #[test]
    fn test_to_json() {
        let (mut store, _) = recording_store();
        store.append("2024", curves(&[100]));
        let json: serde_json::Value = serde_json::from_str(&store.to_json()).unwrap();
        assert_eq!(json[0]["label"], "2024");
        assert_eq!(json[0]["efficiency"][0]["avgHeartrate"], 120.0);
    }
}
