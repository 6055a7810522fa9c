//! # Dashboard
//!
//! Owns everything the visualization needs: the query gateway, the
//! configuration, the trace overlay store and the card renderer. UI actions
//! (add/clear trace, preset ranges, card refresh) map onto its methods.
//!
//! ## Concurrency
//!
//! Execution is single-threaded and cooperative. Methods take `&self` so
//! several `add_trace` calls can be in flight at once; the store sits in a
//! `RefCell` and is only borrowed between awaits, never across one.
//!
//! Overlapping operations are not cancelled. Instead, every selection
//! action (`begin_selection`, `clear_traces`, `add_recent_years`) moves the
//! store to a new generation, and an aggregation that finishes for an older
//! generation is dropped rather than appended.

use std::cell::RefCell;

use chrono::{Datelike, NaiveDate};
use log::{debug, error, info, warn};

use crate::aggregation::{self, DateBounds, TraceQuery};
use crate::cards::{self, CardLayout, VisualCard};
use crate::config::{DashboardConfig, RendererKind};
use crate::error::{DashboardError, OptionExt, Result};
use crate::gateway::QueryGateway;
use crate::geometry::{GeometryRenderer, MapViewRenderer, StaticPathRenderer};
use crate::store::{ChartSink, LogChartSink, Trace, TraceOverlayStore};

/// Blocking user prompt (e.g. a browser alert).
pub trait Notifier {
    fn alert(&self, message: &str);
}

/// Notifier that writes prompts to the log instead of the user.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        warn!("[Dashboard] {}", message);
    }
}

/// Outcome of a successful `add_trace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceAdded {
    /// Appended at `index` with `color`
    Appended { index: usize, color: &'static str },
    /// A newer selection started while the queries ran; result dropped
    Stale,
}

/// The visualization engine.
pub struct Dashboard<G: QueryGateway> {
    gateway: G,
    config: DashboardConfig,
    store: RefCell<TraceOverlayStore>,
    notifier: Box<dyn Notifier>,
    renderer: Box<dyn GeometryRenderer>,
    layout: CardLayout,
}

impl<G: QueryGateway> Dashboard<G> {
    /// Build a dashboard over `gateway`.
    ///
    /// Fails with `DatasetUnavailable` if `metrics` is missing. A missing
    /// `routes` dataset only disables activity cards.
    pub async fn open(gateway: G, config: DashboardConfig) -> Result<Self> {
        config.validate()?;

        if !gateway.has_view("metrics").await? {
            error!("[Dashboard] Required dataset 'metrics' is missing");
            return Err(DashboardError::DatasetUnavailable {
                dataset: "metrics".to_string(),
            });
        }
        match gateway.has_view("routes").await {
            Ok(true) => {}
            Ok(false) => warn!("[Dashboard] No route data, activity cards disabled"),
            Err(e) => warn!("[Dashboard] Could not check route data: {}", e),
        }

        let renderer: Box<dyn GeometryRenderer> = match config.renderer {
            RendererKind::Static => Box::new(StaticPathRenderer::from_config(&config)),
            RendererKind::Map => Box::new(MapViewRenderer::from_config(&config)),
        };

        info!("[Dashboard] Initialized ({:?} renderer)", config.renderer);
        Ok(Self {
            gateway,
            layout: CardLayout::from_config(&config),
            config,
            store: RefCell::new(TraceOverlayStore::new(Box::new(LogChartSink))),
            notifier: Box::new(LogNotifier),
            renderer,
        })
    }

    /// Render charts into `sink`. Meant for construction time: any traces
    /// already in the store are dropped.
    pub fn with_chart_sink(mut self, sink: Box<dyn ChartSink>) -> Self {
        self.store = RefCell::new(TraceOverlayStore::new(sink));
        self
    }

    /// Send user prompts to `notifier`.
    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // ========================================================================
    // Traces
    // ========================================================================

    /// Date span of the `metrics` dataset, used to seed default ranges.
    pub async fn bounds(&self) -> Result<DateBounds> {
        aggregation::fetch_bounds(&self.gateway).await
    }

    /// Start a new selection; aggregations still running are dropped when
    /// they finish.
    pub fn begin_selection(&self) -> u64 {
        self.store.borrow_mut().begin_selection()
    }

    /// Aggregate `[start, end]` under `max_watts` and append it as a trace.
    ///
    /// `max_watts` defaults to the configured ceiling. Invalid and empty
    /// ranges leave the store unchanged and, unless `silent`, alert the
    /// user. Gateway errors are returned as-is.
    pub async fn add_trace(
        &self,
        label: &str,
        start: &str,
        end: &str,
        max_watts: Option<f64>,
        silent: bool,
    ) -> Result<TraceAdded> {
        let generation = self.store.borrow().generation();
        let max_watts = max_watts.unwrap_or(self.config.default_max_watts);

        let query = match TraceQuery::new(start, end, max_watts) {
            Ok(query) => query,
            Err(err) => return Err(self.report(err, silent)),
        };

        let curves = match aggregation::fetch_curves(&self.gateway, &query).await {
            Ok(curves) => curves,
            Err(err) => {
                error!("[Dashboard] Trace '{}' failed: {}", label, err);
                return Err(err);
            }
        };

        if self.store.borrow().generation() != generation {
            debug!("[Dashboard] Trace '{}' superseded by a newer selection", label);
            return Ok(TraceAdded::Stale);
        }

        if curves.efficiency.is_empty() {
            return Err(self.report(
                DashboardError::EmptyRange {
                    label: label.to_string(),
                    start: query.start,
                    end: query.end,
                },
                silent,
            ));
        }

        let mut store = self.store.borrow_mut();
        Ok(match store.append_if_current(generation, label, curves) {
            Some(index) => TraceAdded::Appended {
                index,
                color: store.traces()[index].color,
            },
            None => TraceAdded::Stale,
        })
    }

    /// Replace the overlay with one trace per calendar year, ending with
    /// the year of the latest data. Years without data are skipped, and the
    /// window never reaches back past the year of the earliest data.
    pub async fn add_recent_years(&self, years: Option<u32>) -> Result<Vec<TraceAdded>> {
        let years = years.unwrap_or(self.config.default_trace_years);
        let bounds = self.bounds().await?;
        let last_year = year_of(&bounds.max)?;
        let first_data_year = year_of(&bounds.min)?;

        let first_year = (i64::from(last_year) + 1 - i64::from(years))
            .max(i64::from(first_data_year));
        let first_year = i32::try_from(first_year).map_err(|_| DashboardError::Config {
            message: format!("cannot go back {} years from {}", years, last_year),
        })?;

        self.clear_traces();

        let mut outcomes = Vec::new();
        for year in first_year..=last_year {
            let label = year.to_string();
            let start = format!("{}-01-01", year);
            let end = format!("{}-12-31", year);
            match self.add_trace(&label, &start, &end, None, true).await {
                Ok(TraceAdded::Stale) => {
                    outcomes.push(TraceAdded::Stale);
                    break;
                }
                Ok(outcome) => outcomes.push(outcome),
                Err(DashboardError::EmptyRange { .. }) => {
                    debug!("[Dashboard] No data for {}, skipped", year)
                }
                Err(err) => return Err(err),
            }
        }
        Ok(outcomes)
    }

    /// Remove every trace. Also starts a new selection.
    pub fn clear_traces(&self) {
        self.store.borrow_mut().clear();
    }

    pub fn trace_count(&self) -> usize {
        self.store.borrow().len()
    }

    /// Snapshot of the overlay in legend order.
    pub fn traces(&self) -> Vec<Trace> {
        self.store.borrow().traces().to_vec()
    }

    pub fn traces_json(&self) -> String {
        self.store.borrow().to_json()
    }

    // ========================================================================
    // Activity cards
    // ========================================================================

    /// Cards for the most recent `limit` activities (default from config).
    ///
    /// Never fails: a broken pass is logged and yields no cards, leaving the
    /// rest of the dashboard untouched.
    pub async fn render_cards(&self, limit: Option<usize>) -> Vec<VisualCard> {
        let limit = limit.unwrap_or(self.config.card_limit);
        match cards::render_cards(&self.gateway, self.renderer.as_ref(), &self.layout, limit).await
        {
            Ok(cards) => {
                debug!("[Dashboard] Rendered {} cards", cards.len());
                cards
            }
            Err(e) => {
                error!("[Dashboard] Card rendering failed: {}", e);
                Vec::new()
            }
        }
    }

    fn report(&self, err: DashboardError, silent: bool) -> DashboardError {
        if silent {
            debug!("[Dashboard] {}", err);
        } else {
            self.notifier.alert(&err.to_string());
        }
        err
    }
}

/// Calendar year of an ISO `YYYY-MM-DD` date (time suffix ignored).
fn year_of(date: &str) -> Result<i32> {
    let day = date
        .get(..10)
        .ok_or_decode(&format!("bad date '{}'", date))?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(|d| d.year())
        .map_err(|e| DashboardError::Decode {
            message: format!("bad date '{}': {}", date, e),
        })
}
