//! Activity card rendering against SQLite route summaries

use fitness_viz::cards::render_cards;
use fitness_viz::{
    CardLayout, Dashboard, DashboardConfig, GeometryRenderer, GeometryVisual, MapViewRenderer,
    MetricSample, RendererKind, RouteSummary, SqliteGateway,
};
use geo::LineString;
use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn route(id: &str, date: &str, geometry: &str) -> RouteSummary {
    RouteSummary {
        activity_id: id.to_string(),
        activity_name: format!("Ride {}", id),
        date: date.to_string(),
        geometry: geometry.to_string(),
        watts_stream: (0..3600).map(|i| 180.0 + (i % 60) as f64).collect(),
        hr_stream: (0..3600).map(|i| 120.0 + (i % 30) as f64).collect(),
        avg_watts: Some(209.5),
        avg_hr: Some(134.5),
        duration_seconds: 3600.0,
    }
}

fn gateway(routes: &[RouteSummary]) -> SqliteGateway {
    let gateway = SqliteGateway::in_memory().unwrap();
    gateway
        .load_metrics(&[MetricSample::new("2024-01-01", 200.0, 130.0, 60.0)])
        .unwrap();
    if !routes.is_empty() {
        gateway.load_routes(routes).unwrap();
    }
    gateway
}

async fn dashboard(routes: &[RouteSummary], config: DashboardConfig) -> Dashboard<SqliteGateway> {
    Dashboard::open(gateway(routes), config).await.unwrap()
}

const LAUSANNE: &str = "LINESTRING (6.63 46.52, 6.64 46.53, 6.66 46.51)";

#[tokio::test]
async fn test_cards_newest_first_and_limited() {
    let routes: Vec<RouteSummary> = (1..=30)
        .map(|day| route(&format!("r{:02}", day), &format!("2024-05-{:02}", day), LAUSANNE))
        .collect();
    let dash = dashboard(&routes, DashboardConfig::default()).await;

    let cards = dash.render_cards(None).await;
    assert_eq!(cards.len(), 25);
    assert_eq!(cards[0].activity_id, "r30");
    assert_eq!(cards[24].activity_id, "r06");
    assert!(cards.windows(2).all(|w| w[0].date > w[1].date));

    let cards = dash.render_cards(Some(3)).await;
    let ids: Vec<&str> = cards.iter().map(|c| c.activity_id.as_str()).collect();
    assert_eq!(ids, vec!["r30", "r29", "r28"]);
}

#[tokio::test]
async fn test_card_contents() {
    let dash = dashboard(&[route("a", "2024-05-01", LAUSANNE)], DashboardConfig::default()).await;
    let card = &dash.render_cards(None).await[0];

    assert_eq!(card.activity_name, "Ride a");
    assert_eq!(card.stats.avg_watts, Some(210));
    assert_eq!(card.stats.avg_hr, Some(135));
    assert_eq!(card.stats.hours, 1.0);

    // 3600 samples with a stride of 24
    assert_eq!(card.power_sparkline.points.len(), 150);
    assert_eq!(card.hr_sparkline.points.len(), 150);
    for [x, y] in &card.power_sparkline.points {
        assert!((0.0..=120.0).contains(x));
        assert!((0.0..=30.0).contains(y));
    }

    match &card.path {
        Some(GeometryVisual::Path(path)) => {
            assert_eq!(path.points.len(), 3);
            assert!(path.d.starts_with('M'));
            for [x, y] in &path.points {
                assert!(*x > 0.0 && *x < 100.0);
                assert!(*y > 0.0 && *y < 100.0);
            }
        }
        other => panic!("expected a static path, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_geometry_does_not_drop_cards() {
    let routes = vec![
        route("good1", "2024-05-03", LAUSANNE),
        route("bad", "2024-05-02", "LINESTRING (6.63 46.52, oops)"),
        route("good2", "2024-05-01", LAUSANNE),
    ];
    let dash = dashboard(&routes, DashboardConfig::default()).await;

    let cards = dash.render_cards(None).await;
    assert_eq!(cards.len(), 3);
    assert!(cards[0].path.is_some());
    assert!(cards[1].path.is_none());
    assert!(!cards[1].power_sparkline.is_empty());
    assert!(cards[2].path.is_some());
}

#[tokio::test]
async fn test_geojson_geometry() {
    let geojson = r#"{"type":"LineString","coordinates":[[6.63,46.52],[6.64,46.53]]}"#;
    let dash = dashboard(&[route("g", "2024-05-01", geojson)], DashboardConfig::default()).await;
    let cards = dash.render_cards(None).await;
    assert!(matches!(cards[0].path, Some(GeometryVisual::Path(_))));
}

#[tokio::test]
async fn test_map_renderer() {
    let config = DashboardConfig {
        renderer: RendererKind::Map,
        ..Default::default()
    };
    let routes = vec![
        route("long", "2024-05-02", "LINESTRING (6.0 46.0, 7.0 47.0)"),
        route("short", "2024-05-01", "LINESTRING (6.63 46.52, 6.6301 46.5201)"),
    ];
    let dash = dashboard(&routes, config).await;
    let cards = dash.render_cards(None).await;
    assert_eq!(cards.len(), 2);

    let zooms: Vec<f64> = cards
        .iter()
        .map(|c| match &c.path {
            Some(GeometryVisual::Map(view)) => view.zoom,
            other => panic!("expected a map view, got {:?}", other),
        })
        .collect();
    assert!(zooms[0] < zooms[1]);
    assert_eq!(zooms[1], 16.0);
}

#[tokio::test]
async fn test_missing_routes_gives_no_cards() {
    let dash = dashboard(&[], DashboardConfig::default()).await;
    assert!(dash.render_cards(None).await.is_empty());
}

#[tokio::test]
async fn test_empty_streams() {
    let mut r = route("quiet", "2024-05-01", LAUSANNE);
    r.watts_stream.clear();
    r.hr_stream = vec![140.0; 10];
    let dash = dashboard(&[r], DashboardConfig::default()).await;

    let card = &dash.render_cards(None).await[0];
    assert!(card.power_sparkline.is_empty());
    // Constant stream: flat and finite
    assert!(card.hr_sparkline.points.iter().all(|p| p[1] == 30.0));
}

/// Map backend that notes how far a concurrent ticker had advanced each
/// time a record is rendered.
struct TickRecorder {
    inner: MapViewRenderer,
    ticks: Arc<AtomicUsize>,
    seen: Mutex<Vec<usize>>,
}

impl GeometryRenderer for TickRecorder {
    fn render_geometry(&self, line: &LineString<f64>) -> Option<GeometryVisual> {
        self.seen
            .lock()
            .unwrap()
            .push(self.ticks.load(Ordering::SeqCst));
        self.inner.render_geometry(line)
    }

    fn yields_between_records(&self) -> bool {
        self.inner.yields_between_records()
    }
}

#[tokio::test]
async fn test_map_renderer_yields_between_records() {
    let routes: Vec<RouteSummary> = (1..=4)
        .map(|day| route(&format!("r{}", day), &format!("2024-05-0{}", day), LAUSANNE))
        .collect();
    let gateway = gateway(&routes);

    let ticks = Arc::new(AtomicUsize::new(0));
    let renderer = TickRecorder {
        inner: MapViewRenderer::from_config(&DashboardConfig::default()),
        ticks: ticks.clone(),
        seen: Mutex::new(Vec::new()),
    };
    let done = Cell::new(false);

    let (cards, ()) = futures::join!(
        async {
            let cards = render_cards(&gateway, &renderer, &CardLayout::default(), 10).await;
            done.set(true);
            cards
        },
        async {
            while !done.get() {
                ticks.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        }
    );

    assert_eq!(cards.unwrap().len(), 4);
    let seen = renderer.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 4);
    // The host got control back between every pair of records
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "ticks seen: {:?}", seen);
}
