use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use covid_core::{CovidError, Dataset, FilterSpec};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::metrics::{QueryOperation, QueryTimer};
use crate::AppState;

/// Body of every not-found response
pub const NOT_FOUND_BODY: &str = "404 Not Found";

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, store) = match state.executor.store().health_check().await {
        Ok(()) => (StatusCode::OK, "healthy".to_string()),
        Err(err) => {
            warn!("Store health check failed: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
    };

    let overall = if status.is_success() {
        "healthy"
    } else {
        "unhealthy"
    };

    (
        status,
        Json(json!({
            "status": overall,
            "service": "covid-query",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.server.environment,
            "store": store,
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.prometheus_format()
}

/// Fallback for unknown routes
pub async fn not_found_handler() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY)
}

/// Build the filter specification from path segments and the query string.
///
/// The entity segment is named `country` on global routes and `region`
/// elsewhere. Unparsable dates and limits are ignored.
pub fn filter_spec(path: &HashMap<String, String>, query: &HashMap<String, String>) -> FilterSpec {
    let mut builder = FilterSpec::builder();

    if let Some(key) = path.get("country").or_else(|| path.get("region")) {
        builder = builder.entity_key(key);
    }
    if let Some(keys) = path.get("keys") {
        builder = builder.fields(keys);
    }
    if let Some(from) = path.get("from") {
        builder = builder.from(from);
    }
    if let Some(to) = path.get("to") {
        builder = builder.to(to);
    }
    if let Some(limit) = query.get("limit").and_then(|l| l.parse().ok()) {
        builder = builder.limit(limit);
    }

    builder.build()
}

/// List, Agg and Sum endpoint for one dataset
pub async fn dataset_query_handler(
    state: AppState,
    dataset: Dataset,
    operation: QueryOperation,
    uri: Uri,
    path: Option<Path<HashMap<String, String>>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let cache_key = uri.to_string();
    if state.cache.is_enabled() {
        if let Some(body) = state.cache.get(&cache_key).await {
            state.metrics.record_cache_hit();
            return json_body(body);
        }
        state.metrics.record_cache_miss();
    }

    let path = path.map(|Path(params)| params).unwrap_or_default();
    let spec = filter_spec(&path, &query);
    debug!(%dataset, %operation, ?spec, "Received query request");

    let service = state.service(dataset);
    let timer = QueryTimer::start(operation);
    let result = match operation {
        QueryOperation::List => service.list(&spec).await,
        QueryOperation::Agg => service.agg(&spec).await,
        QueryOperation::Sum => service.sum(&spec).await,
    };

    match result {
        Ok(docs) if docs.is_empty() => {
            timer.finish(&state.metrics, 0);
            debug!(%dataset, %operation, "No matching records");
            (StatusCode::NOT_FOUND, Json(NOT_FOUND_BODY)).into_response()
        }
        Ok(docs) => {
            let records = docs.len();
            timer.finish(&state.metrics, records);
            match serde_json::to_vec(&docs) {
                Ok(body) => {
                    let body = Bytes::from(body);
                    state.cache.insert(cache_key, body.clone()).await;
                    info!(%dataset, %operation, records, "Query executed successfully");
                    json_body(body)
                }
                Err(err) => error_response(&state, operation, CovidError::from(err)),
            }
        }
        Err(err) => error_response(&state, operation, err),
    }
}

fn json_body(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn error_response(state: &AppState, operation: QueryOperation, err: CovidError) -> Response {
    error!("Query execution failed: {}", err);
    state.metrics.record_error(operation, err.is_timeout());

    let status_code = match err.category() {
        "timeout" => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status_code,
        Json(json!({
            "error": "Query execution failed",
            "message": err.to_string(),
            "category": err.category()
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use covid_core::time::parse_day;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_filter_spec_from_path_segments() {
        let spec = filter_spec(
            &params(&[
                ("country", "grc"),
                ("keys", "cases,deaths"),
                ("from", "2021-01-01"),
                ("to", "2021-01-31"),
            ]),
            &params(&[("limit", "10")]),
        );

        assert_eq!(spec.entity_key.as_deref(), Some("grc"));
        assert_eq!(spec.field_subset.as_deref(), Some("cases,deaths"));
        assert_eq!(spec.date_from, parse_day("2021-01-01"));
        assert_eq!(spec.date_to, parse_day("2021-01-31"));
        assert_eq!(spec.limit, Some(10));
    }

    #[test]
    fn test_filter_spec_is_permissive() {
        let spec = filter_spec(
            &params(&[("region", "ALL"), ("from", "yesterday")]),
            &params(&[("limit", "many")]),
        );

        assert_eq!(spec, FilterSpec::default());
    }
}
