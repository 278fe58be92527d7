//! Covid Query Service Library
//!
//! HTTP surface over the covid-core datasets: list, series (`/agg`) and
//! totals (`/total`) routes per dataset, a response cache, health and
//! Prometheus metrics endpoints.

// Core modules
pub mod cache;
pub mod config;
pub mod handlers;
pub mod metrics;

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    routing::{get, MethodRouter},
    Router,
};
use covid_core::{Dataset, DatasetService, DocumentStore, QueryExecutor};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

// Re-export commonly used types
pub use cache::ResponseCache;
pub use config::QueryConfig;
pub use metrics::{QueryMetricsCollector, QueryOperation};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub executor: QueryExecutor,
    pub config: Arc<QueryConfig>,
    pub metrics: Arc<QueryMetricsCollector>,
    pub cache: ResponseCache,
}

impl AppState {
    pub fn new(config: QueryConfig, store: Arc<dyn DocumentStore>) -> Self {
        let executor = QueryExecutor::new(store).with_timeout(config.query.timeout());
        let cache = ResponseCache::new(&config.cache);

        Self {
            executor,
            config: Arc::new(config),
            metrics: Arc::new(QueryMetricsCollector::new()),
            cache,
        }
    }

    /// Query operations for one dataset
    pub fn service(&self, dataset: Dataset) -> DatasetService {
        DatasetService::new(dataset, self.executor.clone())
    }
}

/// Bare operation paths answered with the global dataset
const GLOBAL_ALIASES: [(&str, QueryOperation); 2] =
    [("/agg", QueryOperation::Agg), ("/total", QueryOperation::Sum)];

/// URL prefixes of one dataset's routes
struct DatasetRoutes {
    dataset: Dataset,
    /// Name of the entity path segment
    key: &'static str,
    list: &'static [&'static str],
    agg: &'static [&'static str],
    sum: &'static [&'static str],
}

const DATASET_ROUTES: [DatasetRoutes; 3] = [
    DatasetRoutes {
        dataset: Dataset::Global,
        key: "country",
        list: &["/global"],
        agg: &["/agg/global"],
        sum: &["/total/global"],
    },
    DatasetRoutes {
        dataset: Dataset::Regional,
        key: "region",
        list: &["/greece"],
        agg: &["/agg/greece"],
        sum: &["/total/greece"],
    },
    DatasetRoutes {
        dataset: Dataset::Vaccination,
        key: "region",
        list: &["/vaccines/greece"],
        agg: &["/agg/vaccines/greece"],
        sum: &["/total/vaccines/greece"],
    },
];

fn query_route(dataset: Dataset, operation: QueryOperation) -> MethodRouter<AppState> {
    get(
        move |State(state): State<AppState>,
              uri: Uri,
              path: Option<Path<HashMap<String, String>>>,
              query: Query<HashMap<String, String>>| async move {
            handlers::dataset_query_handler(state, dataset, operation, uri, path, query).await
        },
    )
}

/// Every path a prefix answers on: each trailing segment is optional.
/// Totals routes take no field-subset segment.
fn route_paths(prefix: &str, key: &str, operation: QueryOperation) -> Vec<String> {
    let segments: &[&str] = match operation {
        QueryOperation::Sum => &["from", "to"],
        QueryOperation::List | QueryOperation::Agg => &["keys", "from", "to"],
    };

    let mut paths = vec![prefix.to_string()];
    let mut path = format!("{prefix}/:{key}");
    paths.push(path.clone());
    for segment in segments {
        path = format!("{path}/:{segment}");
        paths.push(path.clone());
    }
    paths
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler));

    for (path, operation) in GLOBAL_ALIASES {
        router = router.route(path, query_route(Dataset::Global, operation));
    }

    for routes in &DATASET_ROUTES {
        let groups = [
            (QueryOperation::List, routes.list),
            (QueryOperation::Agg, routes.agg),
            (QueryOperation::Sum, routes.sum),
        ];
        for (operation, prefixes) in groups {
            for prefix in prefixes {
                for path in route_paths(prefix, routes.key, operation) {
                    router = router.route(&path, query_route(routes.dataset, operation));
                }
            }
        }
    }

    router
        .fallback(handlers::not_found_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
