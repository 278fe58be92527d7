//! API Integration tests for the covid query service
//!
//! These tests validate the public HTTP API using an in-memory store.
//! They test the full request/response cycle without requiring external services.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate, Utc};
use covid_core::{time::start_of_day, value, Document, MemoryStore};
use covid_query::{config::QueryConfig, create_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

fn doc(fields: &[(&str, value::Value)]) -> Document {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn date(raw: &str) -> value::Value {
    value::Value::Date(start_of_day(day(raw)))
}

fn seeded_store() -> MemoryStore {
    let mut global = Vec::new();
    let mut greece = Vec::new();
    for (i, d) in ["2021-01-01", "2021-01-02", "2021-01-03"].iter().enumerate() {
        let i = i as i64;
        for (iso3, base) in [("GRC", 100), ("ITA", 1000)] {
            global.push(doc(&[
                ("_id", format!("{iso3}{d}").into()),
                ("iso3", iso3.into()),
                ("country", iso3.into()),
                ("date", date(d)),
                ("cases", (base + i).into()),
                ("new_cases", (10 + i).into()),
                ("source", "jhu".into()),
            ]));
        }
        greece.push(doc(&[
            ("uid", 1i64.into()),
            ("region", "Attica".into()),
            ("date", date(d)),
            ("cases", (50 + i).into()),
            ("new_cases", 5i64.into()),
        ]));
    }

    // today's record, for the default date window
    let today = Utc::now().date_naive();
    global.push(doc(&[
        ("iso3", "GRC".into()),
        ("date", value::Value::Date(start_of_day(today))),
        ("cases", 999i64.into()),
    ]));
    global.push(doc(&[
        ("iso3", "GRC".into()),
        (
            "date",
            value::Value::Date(start_of_day(today - Duration::days(1))),
        ),
        ("cases", 998i64.into()),
    ]));

    MemoryStore::new()
        .with_documents("global", global)
        .with_documents("greece", greece)
}

/// Create a test app instance over the given store
fn create_test_app_with(config: QueryConfig, store: MemoryStore) -> (Router, AppState) {
    let state = AppState::new(config, Arc::new(store));
    (create_router(state.clone()), state)
}

fn create_test_app() -> Router {
    create_test_app_with(QueryConfig::default(), seeded_store()).0
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[cfg(test)]
mod api_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let (status, json) = get_json(create_test_app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["service"], "covid-query");
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["environment"], "development");
        assert!(json.get("timestamp").is_some());
    }

    #[tokio::test]
    async fn test_health_reports_failing_store() {
        let (app, _) = create_test_app_with(
            QueryConfig::default(),
            MemoryStore::new().with_error_simulation(),
        );
        let (status, json) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_list_global_date_range() {
        let (status, json) =
            get_json(create_test_app(), "/global/all/all/2021-01-01/2021-01-02").await;
        assert_eq!(status, StatusCode::OK);

        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 4);
        let order: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r["date"].as_str().unwrap(), r["iso3"].as_str().unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2021-01-01T00:00:00Z", "GRC"),
                ("2021-01-01T00:00:00Z", "ITA"),
                ("2021-01-02T00:00:00Z", "GRC"),
                ("2021-01-02T00:00:00Z", "ITA"),
            ]
        );
        assert!(records.iter().all(|r| r.get("_id").is_none()));
    }

    #[tokio::test]
    async fn test_list_defaults_to_today() {
        let (status, json) = get_json(create_test_app(), "/global/grc").await;
        assert_eq!(status, StatusCode::OK);
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["cases"], 999);
    }

    #[tokio::test]
    async fn test_list_projection_segment() {
        let (status, json) =
            get_json(create_test_app(), "/global/ITA/cases,bogus/2021-01-03").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!([{ "cases": 1002 }]));
    }

    #[tokio::test]
    async fn test_empty_result_is_not_found() {
        let (status, json) =
            get_json(create_test_app(), "/global/xyz/all/2021-01-01").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json, "404 Not Found");

        // nothing stored for vaccinations at all
        let (status, _) = get(create_test_app(), "/vaccines/greece").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_agg_routes() {
        let (status, json) =
            get_json(create_test_app(), "/agg/global/all/cases/2021-01-01/2021-01-03").await;
        assert_eq!(status, StatusCode::OK);
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["iso3"], "GRC");
        assert_eq!(records[0]["cases"], serde_json::json!([100, 101, 102]));
        assert_eq!(records[0]["from"], "2021-01-01T00:00:00Z");
        assert_eq!(records[0]["to"], "2021-01-03T00:00:00Z");
        assert_eq!(records[0]["sources"], serde_json::json!(["jhu"]));
        assert!(records[0].get("new_cases").is_none());

        let (status, json) =
            get_json(create_test_app(), "/agg/greece/1/all/2021-01-01").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["region"], "Attica");
        assert_eq!(json[0]["new_cases"], serde_json::json!([5, 5, 5]));

        // the bare route only sees today's global record
        let (status, json) = get_json(create_test_app(), "/agg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["cases"], serde_json::json!([999]));
    }

    #[tokio::test]
    async fn test_total_routes() {
        let (status, json) =
            get_json(create_test_app(), "/total/greece/all/2021-01-01/2021-01-03").await;
        assert_eq!(status, StatusCode::OK);
        let records = json.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["total_cases"], 52);
        assert_eq!(records[0]["cases"], 15);

        let (status, json) =
            get_json(create_test_app(), "/total/global/ita/2021-01-01/2021-01-02").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["total_cases"], 1001);
        assert_eq!(json[0]["cases"], 10 + 11);

        // totals take no field-subset segment
        let (status, _) = get(
            create_test_app(),
            "/total/global/ita/cases/2021-01-01/2021-01-02",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (status, body) = get(create_test_app(), "/api/v1/datapoints").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, b"404 Not Found");
    }

    #[tokio::test]
    async fn test_store_failure_is_server_error() {
        let (app, _) = create_test_app_with(
            QueryConfig::default(),
            MemoryStore::new().with_error_simulation(),
        );
        let (status, json) = get_json(app, "/greece/all/all/2021-01-01").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "Query execution failed");
        assert_eq!(json["category"], "store");
        assert!(json["message"]
            .as_str()
            .unwrap()
            .starts_with("db.greece.find(): "));
    }

    #[tokio::test]
    async fn test_slow_store_is_gateway_timeout() {
        let mut config = QueryConfig::default();
        config.query.query_timeout_ms = 20;
        let (app, state) = create_test_app_with(
            config,
            MemoryStore::new().with_latency(std::time::Duration::from_millis(200)),
        );

        let (status, json) = get_json(app, "/total").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(json["category"], "timeout");

        let snapshot = state.metrics.snapshot();
        let sum = snapshot.operation(covid_query::QueryOperation::Sum);
        assert_eq!(sum.errors_total, 1);
        assert_eq!(sum.timeouts_total, 1);
    }

    #[tokio::test]
    async fn test_successful_responses_are_cached() {
        let (app, state) = create_test_app_with(QueryConfig::default(), seeded_store());
        let uri = "/global/grc/all/2021-01-01/2021-01-01";

        let (first_status, first) = get(app.clone(), uri).await;
        let (second_status, second) = get(app.clone(), uri).await;
        assert_eq!(first_status, StatusCode::OK);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(first, second);

        // not-found responses are not cached
        let (status, _) = get(app.clone(), "/global/xyz/all/2021-01-01").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let snapshot = state.metrics.snapshot();
        assert_eq!(snapshot.cache_hits_total, 1);
        assert_eq!(snapshot.cache_misses_total, 2);
        assert_eq!(state.cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_returns_prometheus_format() {
        let (app, _) = create_test_app_with(QueryConfig::default(), seeded_store());
        let _ = get(app.clone(), "/agg/global/all/all/2021-01-01").await;

        let (status, body) = get(app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let body_str = String::from_utf8(body).unwrap();

        // Check basic Prometheus format
        assert!(body_str.contains("# HELP"));
        assert!(body_str.contains("# TYPE"));
        assert!(body_str.contains("covid_query_queries_total{operation=\"agg\"} 1"));
        assert!(body_str.contains("covid_query_cache_misses_total 1"));
    }

    #[tokio::test]
    async fn test_cors_and_compression_headers() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/global/all/all/2021-01-01")
            .header(header::ORIGIN, "https://example.org")
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap();

        let response = create_test_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    }
}
