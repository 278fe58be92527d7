//! Metrics collection and reporting for the query service

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// The three read operations served per dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOperation {
    List,
    Agg,
    Sum,
}

impl QueryOperation {
    pub const ALL: [QueryOperation; 3] =
        [QueryOperation::List, QueryOperation::Agg, QueryOperation::Sum];

    pub fn as_str(self) -> &'static str {
        match self {
            QueryOperation::List => "list",
            QueryOperation::Agg => "agg",
            QueryOperation::Sum => "sum",
        }
    }
}

impl fmt::Display for QueryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one operation
#[derive(Debug, Default)]
struct OperationCounters {
    queries_total: AtomicU64,
    errors_total: AtomicU64,
    timeouts_total: AtomicU64,
    not_found_total: AtomicU64,
    records_returned_total: AtomicU64,
    query_time_total_ms: AtomicU64,
}

/// Thread-safe metrics collector for query service
#[derive(Debug)]
pub struct QueryMetricsCollector {
    list: OperationCounters,
    agg: OperationCounters,
    sum: OperationCounters,

    /// Cache hits
    pub cache_hits_total: AtomicU64,

    /// Cache misses
    pub cache_misses_total: AtomicU64,

    /// Service start time
    start_time: Instant,
}

impl Default for QueryMetricsCollector {
    fn default() -> Self {
        Self {
            list: OperationCounters::default(),
            agg: OperationCounters::default(),
            sum: OperationCounters::default(),
            cache_hits_total: AtomicU64::new(0),
            cache_misses_total: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl QueryMetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, operation: QueryOperation) -> &OperationCounters {
        match operation {
            QueryOperation::List => &self.list,
            QueryOperation::Agg => &self.agg,
            QueryOperation::Sum => &self.sum,
        }
    }

    /// Record a completed query. An empty result also counts as not found.
    pub fn record_query(&self, operation: QueryOperation, duration: Duration, records: usize) {
        let counters = self.counters(operation);
        counters.queries_total.fetch_add(1, Ordering::Relaxed);
        counters
            .records_returned_total
            .fetch_add(records as u64, Ordering::Relaxed);
        counters
            .query_time_total_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);

        if records == 0 {
            counters.not_found_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a failed query
    pub fn record_error(&self, operation: QueryOperation, timed_out: bool) {
        let counters = self.counters(operation);
        counters.queries_total.fetch_add(1, Ordering::Relaxed);
        counters.errors_total.fetch_add(1, Ordering::Relaxed);
        if timed_out {
            counters.timeouts_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a cache hit
    pub fn record_cache_hit(&self) {
        self.cache_hits_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_cache_miss(&self) {
        self.cache_misses_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> QueryMetricsSnapshot {
        let operations = QueryOperation::ALL.map(|operation| {
            let counters = self.counters(operation);
            OperationSnapshot {
                operation,
                queries_total: counters.queries_total.load(Ordering::Relaxed),
                errors_total: counters.errors_total.load(Ordering::Relaxed),
                timeouts_total: counters.timeouts_total.load(Ordering::Relaxed),
                not_found_total: counters.not_found_total.load(Ordering::Relaxed),
                records_returned_total: counters.records_returned_total.load(Ordering::Relaxed),
                query_time_total_ms: counters.query_time_total_ms.load(Ordering::Relaxed),
            }
        });
        let cache_hits = self.cache_hits_total.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses_total.load(Ordering::Relaxed);

        QueryMetricsSnapshot {
            operations,
            cache_hits_total: cache_hits,
            cache_misses_total: cache_misses,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            cache_hit_rate: if cache_hits + cache_misses > 0 {
                cache_hits as f64 / (cache_hits + cache_misses) as f64
            } else {
                0.0
            },
        }
    }

    /// Generate Prometheus format metrics
    pub fn prometheus_format(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        let per_operation: [(&str, &str, fn(&OperationSnapshot) -> u64); 6] = [
            ("queries_total", "Total number of queries executed", |s| {
                s.queries_total
            }),
            ("errors_total", "Total number of failed queries", |s| {
                s.errors_total
            }),
            ("timeouts_total", "Total number of queries that timed out", |s| {
                s.timeouts_total
            }),
            ("not_found_total", "Total number of queries with no matches", |s| {
                s.not_found_total
            }),
            ("records_returned_total", "Total number of records returned", |s| {
                s.records_returned_total
            }),
            ("query_time_total_ms", "Total query execution time in milliseconds", |s| {
                s.query_time_total_ms
            }),
        ];

        for (name, help, value) in per_operation {
            out.push_str(&format!(
                "# HELP covid_query_{name} {help}\n# TYPE covid_query_{name} counter\n"
            ));
            for op in &snapshot.operations {
                out.push_str(&format!(
                    "covid_query_{name}{{operation=\"{}\"}} {}\n",
                    op.operation,
                    value(op)
                ));
            }
            out.push('\n');
        }

        out.push_str(&format!(
            "# HELP covid_query_cache_hits_total Total number of cache hits\n\
             # TYPE covid_query_cache_hits_total counter\n\
             covid_query_cache_hits_total {}\n\
             \n\
             # HELP covid_query_cache_misses_total Total number of cache misses\n\
             # TYPE covid_query_cache_misses_total counter\n\
             covid_query_cache_misses_total {}\n\
             \n\
             # HELP covid_query_cache_hit_rate Cache hit rate (0.0 to 1.0)\n\
             # TYPE covid_query_cache_hit_rate gauge\n\
             covid_query_cache_hit_rate {}\n\
             \n\
             # HELP covid_query_uptime_seconds Service uptime in seconds\n\
             # TYPE covid_query_uptime_seconds gauge\n\
             covid_query_uptime_seconds {}\n",
            snapshot.cache_hits_total,
            snapshot.cache_misses_total,
            snapshot.cache_hit_rate,
            snapshot.uptime_seconds,
        ));

        out
    }
}

/// Counters of one operation at a point in time
#[derive(Debug, Clone)]
pub struct OperationSnapshot {
    pub operation: QueryOperation,
    pub queries_total: u64,
    pub errors_total: u64,
    pub timeouts_total: u64,
    pub not_found_total: u64,
    pub records_returned_total: u64,
    pub query_time_total_ms: u64,
}

/// Snapshot of query metrics at a point in time
#[derive(Debug, Clone)]
pub struct QueryMetricsSnapshot {
    pub operations: [OperationSnapshot; 3],
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub uptime_seconds: u64,
    pub cache_hit_rate: f64,
}

impl QueryMetricsSnapshot {
    pub fn operation(&self, operation: QueryOperation) -> &OperationSnapshot {
        &self.operations[operation as usize]
    }
}

/// Helper for timing query operations
pub struct QueryTimer {
    operation: QueryOperation,
    start: Instant,
}

impl QueryTimer {
    /// Start a new query timer
    pub fn start(operation: QueryOperation) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finish timing and record to metrics collector
    pub fn finish(self, collector: &QueryMetricsCollector, records: usize) {
        collector.record_query(self.operation, self.elapsed(), records);
    }
}
