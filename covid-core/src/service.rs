//! Dataset query operations
//!
//! [`QueryExecutor`] runs one store call under a deadline and tags failures
//! with the collection and operation. [`DatasetService`] binds an executor to
//! one dataset's registry and exposes the three read operations: `list`,
//! `agg` and `sum`. An empty result is not an error; callers decide how to
//! report it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{CovidError, CovidResult};
use crate::filter::{Filter, DATE_FIELD};
use crate::options::FilterSpec;
use crate::pipeline::{Pipeline, SortKey};
use crate::projection::Projection;
use crate::registry::{Dataset, DatasetRegistry};
use crate::store::{DocumentStore, FindQuery};
use crate::value::Document;

/// Ceiling applied to each store call unless configured otherwise
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs store calls under a per-call deadline
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Point query against a collection
    pub async fn find(&self, collection: &str, query: &FindQuery) -> CovidResult<Vec<Document>> {
        self.execute(collection, "find", self.store.find(collection, query))
            .await
    }

    /// Aggregation against a collection, tagged as `operation`
    pub async fn aggregate(
        &self,
        collection: &str,
        operation: &str,
        pipeline: &Pipeline,
    ) -> CovidResult<Vec<Document>> {
        self.execute(
            collection,
            operation,
            self.store.aggregate(collection, pipeline),
        )
        .await
    }

    /// Await `call` under the deadline. Errors, including an expired
    /// deadline, come back tagged `db.<collection>.<operation>()`.
    pub async fn execute<T, F>(&self, collection: &str, operation: &str, call: F) -> CovidResult<T>
    where
        F: Future<Output = CovidResult<T>>,
    {
        let tag = format!("db.{collection}.{operation}()");
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(operation = %tag, error = %e, "query failed");
                Err(e.with_operation(tag))
            }
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(operation = %tag, timeout_ms, "query timed out");
                Err(CovidError::timeout(timeout_ms).with_operation(tag))
            }
        }
    }
}

/// Read operations over one dataset
#[derive(Clone)]
pub struct DatasetService {
    registry: &'static DatasetRegistry,
    executor: QueryExecutor,
}

impl DatasetService {
    pub fn new(dataset: Dataset, executor: QueryExecutor) -> Self {
        Self {
            registry: dataset.registry(),
            executor,
        }
    }

    pub fn dataset(&self) -> Dataset {
        self.registry.dataset
    }

    pub fn registry(&self) -> &'static DatasetRegistry {
        self.registry
    }

    /// Matching daily records, projected, ordered by date then entity key
    pub async fn list(&self, spec: &FilterSpec) -> CovidResult<Vec<Document>> {
        let start = Instant::now();
        if let Some(limit) = spec.limit {
            debug!(limit, "limit is accepted but not applied");
        }

        let query = FindQuery {
            filter: Filter::translate(spec, self.registry),
            projection: Projection::build(spec.field_subset.as_deref(), self.registry),
            sort: vec![SortKey::asc(DATE_FIELD), SortKey::asc(self.registry.key_field)],
        };
        debug!(
            dataset = %self.registry.dataset,
            filter = %query.filter,
            projection = ?query.projection,
            "executing list"
        );

        let docs = self.executor.find(self.registry.collection, &query).await?;
        self.log_completion("list", docs.len(), start);
        Ok(docs)
    }

    /// One record per entity with daily value arrays
    pub async fn agg(&self, spec: &FilterSpec) -> CovidResult<Vec<Document>> {
        let start = Instant::now();
        let filter = Filter::translate(spec, self.registry);
        debug!(dataset = %self.registry.dataset, filter = %filter, "executing agg");

        let pipeline = Pipeline::series(filter, spec, self.registry);
        let docs = self
            .executor
            .aggregate(self.registry.collection, "agg", &pipeline)
            .await?;
        self.log_completion("agg", docs.len(), start);
        Ok(docs)
    }

    /// One record per entity with range totals. The field subset is ignored.
    pub async fn sum(&self, spec: &FilterSpec) -> CovidResult<Vec<Document>> {
        let start = Instant::now();
        let filter = Filter::translate(spec, self.registry);
        debug!(dataset = %self.registry.dataset, filter = %filter, "executing sum");

        let pipeline = Pipeline::totals(filter, self.registry);
        let docs = self
            .executor
            .aggregate(self.registry.collection, "sum", &pipeline)
            .await?;
        self.log_completion("sum", docs.len(), start);
        Ok(docs)
    }

    fn log_completion(&self, operation: &str, records: usize, start: Instant) {
        info!(
            dataset = %self.registry.dataset,
            operation,
            records,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "query completed"
        );
    }
}
