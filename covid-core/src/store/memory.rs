//! In-memory document store
//!
//! Holds decoded documents per collection and evaluates finds and pipelines
//! directly. It can be seeded in code or from a directory of
//! `<collection>.json` exports, each either one JSON array or one object per
//! line. Latency and failure simulation make it usable for exercising the
//! service layer's deadline and error paths.
//!
//! Evaluation runs on the blocking pool so a caller's deadline can expire
//! while a large scan is still in progress.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::error::{CovidError, CovidResult};
use crate::filter::Filter;
use crate::pipeline::{sort_documents, Pipeline, Stage};
use crate::store::{DocumentStore, FindQuery};
use crate::value::{document_from_json, Document};

/// Operation counters
#[derive(Debug, Default)]
struct StoreStats {
    finds: AtomicU64,
    aggregations: AtomicU64,
    failures: AtomicU64,
}

/// Snapshot of [`MemoryStore`] counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub finds: u64,
    pub aggregations: u64,
    pub failures: u64,
}

type Collections = Arc<RwLock<HashMap<String, Vec<Document>>>>;

pub struct MemoryStore {
    collections: Collections,
    stats: StoreStats,
    simulate_errors: bool,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            stats: StoreStats::default(),
            simulate_errors: false,
            latency: None,
        }
    }

    /// Seed a collection, consuming and returning the store
    pub fn with_documents<S: Into<String>>(self, collection: S, docs: Vec<Document>) -> Self {
        self.insert(collection, docs);
        self
    }

    /// Fail every operation with a store error
    pub fn with_error_simulation(mut self) -> Self {
        self.simulate_errors = true;
        self
    }

    /// Delay every operation by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Append documents to a collection
    pub fn insert<S: Into<String>>(&self, collection: S, docs: Vec<Document>) {
        let collection = collection.into();
        trace!(collection = %collection, count = docs.len(), "inserting documents");
        self.collections
            .write()
            .entry(collection)
            .or_default()
            .extend(docs);
    }

    /// Number of documents stored in a collection
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Names of all non-empty collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            finds: self.stats.finds.load(Ordering::Relaxed),
            aggregations: self.stats.aggregations.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
        }
    }

    /// Load every `*.json` file of a directory; the file stem names the
    /// collection.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> CovidResult<Self> {
        let dir = dir.as_ref();
        let store = Self::new();

        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let Some(collection) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!(path = %path.display(), "skipping file with non UTF-8 name");
                continue;
            };
            let docs = parse_export(&fs::read_to_string(&path)?)
                .map_err(|e| CovidError::decode(format!("{}: {e}", path.display())))?;
            info!(
                collection,
                documents = docs.len(),
                "loaded collection from {}",
                path.display()
            );
            store.insert(collection, docs);
        }

        Ok(store)
    }

    async fn simulate(&self, operation: &str, collection: &str) -> CovidResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.simulate_errors {
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
            debug!(operation, collection, "simulated store failure");
            return Err(CovidError::store(format!(
                "simulated failure during {operation} on '{collection}'"
            )));
        }
        Ok(())
    }

    /// Evaluate `work` over a collection on the blocking pool
    async fn evaluate<F>(
        &self,
        operation: &str,
        collection: &str,
        work: F,
    ) -> CovidResult<Vec<Document>>
    where
        F: FnOnce(&Collections, &str) -> Vec<Document> + Send + 'static,
    {
        let collections = Arc::clone(&self.collections);
        let name = collection.to_string();
        tokio::task::spawn_blocking(move || work(&collections, &name))
            .await
            .map_err(|e| {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                CovidError::store(format!("{operation} on '{collection}' aborted: {e}"))
            })
    }
}

/// Clone the documents of a collection that pass `filter`, under the read
/// lock
fn matching(
    collections: &Collections,
    collection: &str,
    filter: Option<&Filter>,
) -> Vec<Document> {
    let collections = collections.read();
    let Some(docs) = collections.get(collection) else {
        return Vec::new();
    };
    docs.iter()
        .filter(|doc| filter.map_or(true, |filter| filter.matches(doc)))
        .cloned()
        .collect()
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a collection export: a JSON array or JSON lines
fn parse_export(content: &str) -> Result<Vec<Document>, String> {
    let content = content.trim_start();
    if content.is_empty() {
        return Ok(Vec::new());
    }

    if content.starts_with('[') {
        let items: Vec<serde_json::Value> =
            serde_json::from_str(content).map_err(|e| e.to_string())?;
        return items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                document_from_json(item).ok_or_else(|| format!("element {i} is not an object"))
            })
            .collect();
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let json: serde_json::Value =
                serde_json::from_str(line).map_err(|e| format!("line {}: {e}", i + 1))?;
            document_from_json(json).ok_or_else(|| format!("line {} is not an object", i + 1))
        })
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, query: &FindQuery) -> CovidResult<Vec<Document>> {
        self.stats.finds.fetch_add(1, Ordering::Relaxed);
        self.simulate("find", collection).await?;

        let query = query.clone();
        self.evaluate("find", collection, move |collections, name| {
            let mut docs = matching(collections, name, Some(&query.filter));
            sort_documents(&mut docs, &query.sort);
            docs.into_iter()
                .map(|doc| query.projection.apply(doc))
                .collect()
        })
        .await
    }

    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
    ) -> CovidResult<Vec<Document>> {
        self.stats.aggregations.fetch_add(1, Ordering::Relaxed);
        self.simulate("aggregate", collection).await?;

        let pipeline = pipeline.clone();
        self.evaluate("aggregate", collection, move |collections, name| {
            // the leading match is applied while scanning
            let (filter, rest) = match pipeline.stages() {
                [Stage::Match(filter), rest @ ..] => (Some(filter), rest),
                stages => (None, stages),
            };
            let docs = matching(collections, name, filter);
            rest.iter().fold(docs, |docs, stage| stage.execute(docs))
        })
        .await
    }

    async fn health_check(&self) -> CovidResult<()> {
        self.simulate("health_check", "*").await
    }
}
