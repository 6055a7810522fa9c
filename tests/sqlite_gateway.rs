//! SQLite query gateway: persistence, dataset discovery and row decoding

use fitness_viz::{
    decode_rows, Dashboard, DashboardConfig, MetricSample, QueryGateway, RouteSummary, SqlParam,
    SqliteGateway,
};
use serde_json::Value;
use tempfile::TempDir;

fn ride(id: &str, date: &str) -> RouteSummary {
    RouteSummary {
        activity_id: id.to_string(),
        activity_name: "Lunch Ride".to_string(),
        date: date.to_string(),
        geometry: "LINESTRING (6.63 46.52, 6.64 46.53)".to_string(),
        watts_stream: vec![150.0, 175.5, 200.0],
        hr_stream: vec![120.0, 125.0, 130.0],
        avg_watts: Some(175.2),
        avg_hr: None,
        duration_seconds: 3.0,
    }
}

#[tokio::test]
async fn test_dataset_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fitness.db");

    {
        let gateway = SqliteGateway::open(&path).unwrap();
        let loaded = gateway
            .load_metrics(&[
                MetricSample::new("2024-02-01", 180.0, 140.0, 60.0),
                MetricSample::new("2024-02-02", 220.0, 150.0, 60.0),
            ])
            .unwrap();
        assert_eq!(loaded, 2);
        gateway.load_routes(&[ride("r1", "2024-02-01")]).unwrap();
    }

    let gateway = SqliteGateway::open(&path).unwrap();
    assert!(gateway.has_view("metrics").await.unwrap());
    assert!(gateway.has_view("routes").await.unwrap());
    assert!(!gateway.has_view("laps").await.unwrap());

    let dash = Dashboard::open(gateway, DashboardConfig::default())
        .await
        .unwrap();
    assert_eq!(dash.bounds().await.unwrap().max, "2024-02-02");
    assert_eq!(dash.render_cards(None).await.len(), 1);
}

#[tokio::test]
async fn test_route_rows_decode() {
    let gateway = SqliteGateway::in_memory().unwrap();
    gateway
        .load_routes(&[ride("r1", "2024-02-01"), ride("r2", "2024-02-03")])
        .unwrap();

    let rows = gateway
        .query(
            "SELECT * FROM routes WHERE date >= ?1 ORDER BY date",
            &[SqlParam::from("2024-02-02")],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    // Streams are stored as JSON text
    assert!(matches!(rows[0]["watts_stream"], Value::String(_)));
    assert_eq!(rows[0]["avg_hr"], Value::Null);

    let routes: Vec<RouteSummary> = decode_rows(rows).unwrap();
    assert_eq!(routes[0], ride("r2", "2024-02-03"));
}

#[tokio::test]
async fn test_reloading_a_route_replaces_it() {
    let gateway = SqliteGateway::in_memory().unwrap();
    gateway.load_routes(&[ride("r1", "2024-02-01")]).unwrap();

    let mut renamed = ride("r1", "2024-02-01");
    renamed.activity_name = "Evening Ride".to_string();
    gateway.load_routes(&[renamed]).unwrap();

    let rows = gateway
        .query("SELECT activity_name FROM routes", &[])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["activity_name"], "Evening Ride");
}

#[tokio::test]
async fn test_query_error_is_reported() {
    let gateway = SqliteGateway::in_memory().unwrap();
    let err = gateway
        .query("SELECT * FROM missing_table", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, fitness_viz::DashboardError::Query { .. }));
}
