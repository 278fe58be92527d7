//! # Covid Core Library
//!
//! Query translation layer for daily epidemiological time series. It turns
//! loosely-typed request parameters into point queries and aggregation
//! pipelines over three datasets, and runs them against a document store.
//!
//! ## Features
//!
//! - **Registries**: per-dataset collections, entity keys and field lists
//! - **Options**: permissive parsing of keys, field subsets and date bounds
//! - **Translation**: filters, projections and series/totals pipelines
//! - **Execution**: a store trait, an in-memory store and deadline handling
//!
//! ## Input policy
//!
//! Malformed input never fails a request. Unparsable dates leave their bound
//! unset, unknown field names are dropped and unknown entity keys simply
//! match nothing.

pub mod error;
pub mod filter;
pub mod options;
pub mod pipeline;
pub mod projection;
pub mod registry;
pub mod service;
pub mod store;
pub mod time;
pub mod value;

// Re-export commonly used types
pub use error::{CovidError, CovidResult};
pub use filter::Filter;
pub use options::{FilterSpec, FilterSpecBuilder};
pub use pipeline::Pipeline;
pub use projection::Projection;
pub use registry::{is_valid_field, Dataset, DatasetRegistry};
pub use service::{DatasetService, QueryExecutor, DEFAULT_QUERY_TIMEOUT};
pub use store::{DocumentStore, FindQuery, MemoryStore};
pub use value::{Document, Value};

/// Version information for covid-core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
