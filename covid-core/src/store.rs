//! Document store abstraction
//!
//! The query layer speaks to its backing database through two calls: a
//! filtered, projected, sorted `find` and a pipeline `aggregate`. Both are
//! scoped to one named collection. Stores that are slow or fail are handled
//! by the caller; stores themselves apply no deadlines.

pub mod memory;

use async_trait::async_trait;

use crate::error::CovidResult;
use crate::filter::Filter;
use crate::pipeline::{Pipeline, SortKey};
use crate::projection::Projection;
use crate::value::Document;

pub use memory::MemoryStore;

/// A filtered, projected and ordered point query
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub projection: Projection,
    pub sort: Vec<SortKey>,
}

/// Backing database for the query layer.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return every document of `collection` matching the query, shaped by
    /// its projection and ordered by its sort keys.
    async fn find(&self, collection: &str, query: &FindQuery) -> CovidResult<Vec<Document>>;

    /// Run an aggregation pipeline over `collection`
    async fn aggregate(&self, collection: &str, pipeline: &Pipeline)
        -> CovidResult<Vec<Document>>;

    /// Cheap liveness probe
    async fn health_check(&self) -> CovidResult<()> {
        Ok(())
    }
}
