//! Aggregation pipelines for the series and totals operations
//!
//! A pipeline is a list of stages executed in order over the documents of one
//! collection: match, sort, group, sort, project. Both aggregations sort by
//! date before grouping so that `$first`/`$last` style accumulators see the
//! records chronologically no matter how the store returned them.

use indexmap::IndexMap;
use tracing::debug;

use crate::filter::{Filter, DATE_FIELD};
use crate::options::FilterSpec;
use crate::projection::{requested_fields, Projection, ID_FIELD};
use crate::registry::DatasetRegistry;
use crate::value::{field, Document, Value};

/// Output field listing the distinct sources of a group
pub const SOURCES_FIELD: &str = "sources";
/// Field read to build [`SOURCES_FIELD`]
pub const SOURCE_FIELD: &str = "source";
/// Ingestion timestamp carried through aggregations
pub const LAST_UPDATED_FIELD: &str = "last_updated_at";
/// Earliest date of a series group
pub const FROM_FIELD: &str = "from";
/// Latest date of a series group
pub const TO_FIELD: &str = "to";

/// Ascending sort on one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: &'static str,
}

impl SortKey {
    pub const fn asc(field: &'static str) -> Self {
        Self { field }
    }
}

/// Sort documents in place by the given keys. The sort is stable.
pub fn sort_documents(docs: &mut [Document], keys: &[SortKey]) {
    docs.sort_by(|a, b| {
        keys.iter()
            .map(|key| field(a, key.field).compare(field(b, key.field)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Group accumulators; each reads one field of the grouped documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulator {
    /// Value on the first document of the group
    First(&'static str),
    /// Value on the last document of the group
    Last(&'static str),
    /// Largest value in the group
    Max(&'static str),
    /// Every value in document order; missing values become null
    Push(&'static str),
    /// Distinct non-null values in first-seen order
    AddToSet(&'static str),
    /// Arithmetic sum of the numeric values
    Sum(&'static str),
}

/// Group documents by one field and compute named outputs per group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStage {
    pub key: &'static str,
    pub outputs: Vec<(&'static str, Accumulator)>,
}

impl GroupStage {
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            outputs: Vec::new(),
        }
    }

    /// Add an output unless one with the same name already exists
    pub fn output(&mut self, name: &'static str, accumulator: Accumulator) -> &mut Self {
        if !self.outputs.iter().any(|(existing, _)| *existing == name) {
            self.outputs.push((name, accumulator));
        }
        self
    }

    fn execute(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut groups: IndexMap<String, (Value, Vec<AccumulatorState>)> = IndexMap::new();

        for doc in &docs {
            let key = field(doc, self.key).clone();
            let group_id = group_id(&key);
            let (_, states) = groups.entry(group_id).or_insert_with(|| {
                let states = self
                    .outputs
                    .iter()
                    .map(|(_, acc)| AccumulatorState::new(*acc))
                    .collect();
                (key, states)
            });

            for state in states.iter_mut() {
                state.accept(doc);
            }
        }

        groups
            .into_values()
            .map(|(key, states)| {
                let mut out = Document::with_capacity(self.outputs.len() + 1);
                out.insert(ID_FIELD.to_string(), key);
                for ((name, _), state) in self.outputs.iter().zip(states) {
                    out.insert(name.to_string(), state.finish());
                }
                out
            })
            .collect()
    }
}

/// Hashable identity of a group key. Integral floats share the identity of
/// the equal integer, as they do when matching.
fn group_id(key: &Value) -> String {
    let id = match key {
        Value::Float(f)
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
        {
            serde_json::to_string(&Value::Int(*f as i64))
        }
        other => serde_json::to_string(other),
    };
    id.unwrap_or_default()
}

#[derive(Debug)]
enum AccumulatorState {
    First { field: &'static str, value: Option<Value> },
    Last { field: &'static str, value: Value },
    Max { field: &'static str, value: Value },
    Push { field: &'static str, values: Vec<Value> },
    AddToSet { field: &'static str, values: Vec<Value> },
    Sum { field: &'static str, total: NumericSum },
}

impl AccumulatorState {
    fn new(accumulator: Accumulator) -> Self {
        match accumulator {
            Accumulator::First(field) => Self::First { field, value: None },
            Accumulator::Last(field) => Self::Last {
                field,
                value: Value::Null,
            },
            Accumulator::Max(field) => Self::Max {
                field,
                value: Value::Null,
            },
            Accumulator::Push(field) => Self::Push {
                field,
                values: Vec::new(),
            },
            Accumulator::AddToSet(field) => Self::AddToSet {
                field,
                values: Vec::new(),
            },
            Accumulator::Sum(field) => Self::Sum {
                field,
                total: NumericSum::default(),
            },
        }
    }

    fn accept(&mut self, doc: &Document) {
        match self {
            Self::First { field: name, value } => {
                if value.is_none() {
                    *value = Some(field(doc, name).clone());
                }
            }
            Self::Last { field: name, value } => *value = field(doc, name).clone(),
            Self::Max { field: name, value } => {
                let candidate = field(doc, name);
                if !candidate.is_null() && candidate.compare(value).is_gt() {
                    *value = candidate.clone();
                }
            }
            Self::Push { field: name, values } => values.push(field(doc, name).clone()),
            Self::AddToSet { field: name, values } => {
                let candidate = field(doc, name);
                if !candidate.is_null() && !values.contains(candidate) {
                    values.push(candidate.clone());
                }
            }
            Self::Sum { field: name, total } => total.add(field(doc, name)),
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::First { value, .. } => value.unwrap_or(Value::Null),
            Self::Last { value, .. } | Self::Max { value, .. } => value,
            Self::Push { values, .. } | Self::AddToSet { values, .. } => Value::Array(values),
            Self::Sum { total, .. } => total.into_value(),
        }
    }
}

/// Running sum that stays integral until a float or an overflow shows up
#[derive(Debug, Clone, Copy, PartialEq)]
enum NumericSum {
    Int(i64),
    Float(f64),
}

impl Default for NumericSum {
    fn default() -> Self {
        NumericSum::Int(0)
    }
}

impl NumericSum {
    /// Non-numeric and missing values are ignored
    fn add(&mut self, value: &Value) {
        *self = match (*self, value) {
            (NumericSum::Int(acc), Value::Int(i)) => match acc.checked_add(*i) {
                Some(sum) => NumericSum::Int(sum),
                None => NumericSum::Float(acc as f64 + *i as f64),
            },
            (NumericSum::Int(acc), Value::Float(f)) => NumericSum::Float(acc as f64 + f),
            (NumericSum::Float(acc), Value::Int(i)) => NumericSum::Float(acc + *i as f64),
            (NumericSum::Float(acc), Value::Float(f)) => NumericSum::Float(acc + f),
            (current, _) => current,
        };
    }

    fn into_value(self) -> Value {
        match self {
            NumericSum::Int(i) => Value::Int(i),
            NumericSum::Float(f) => Value::Float(f),
        }
    }
}

/// One pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Sort(Vec<SortKey>),
    Group(GroupStage),
    Project(Projection),
}

impl Stage {
    pub fn execute(&self, mut docs: Vec<Document>) -> Vec<Document> {
        match self {
            Stage::Match(filter) => {
                docs.retain(|doc| filter.matches(doc));
                docs
            }
            Stage::Sort(keys) => {
                sort_documents(&mut docs, keys);
                docs
            }
            Stage::Group(group) => group.execute(docs),
            Stage::Project(projection) => docs
                .into_iter()
                .map(|doc| projection.apply(doc))
                .collect(),
        }
    }
}

/// Ordered list of stages
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage over the given documents
    pub fn execute(&self, mut docs: Vec<Document>) -> Vec<Document> {
        for stage in &self.stages {
            docs = stage.execute(docs);
        }
        docs
    }

    /// Per-entity columnar series.
    ///
    /// Each group carries first-seen metadata, the distinct sources, the
    /// date span and one daily array per selected field. Without a subset
    /// (or with `all`) the dataset's default series are emitted.
    pub fn series(filter: Filter, spec: &FilterSpec, registry: &DatasetRegistry) -> Self {
        let mut group = entity_group(registry);
        group
            .output(FROM_FIELD, Accumulator::First(DATE_FIELD))
            .output(TO_FIELD, Accumulator::Last(DATE_FIELD))
            .output(LAST_UPDATED_FIELD, Accumulator::Max(LAST_UPDATED_FIELD));

        let selected = requested_fields(spec.field_subset.as_deref(), registry);
        let series = selected.as_deref().unwrap_or(registry.default_series);
        for &name in series {
            group.output(name, Accumulator::Push(name));
        }
        debug!(
            dataset = %registry.dataset,
            fields = ?series,
            "built series pipeline"
        );

        Self::grouped(filter, group, registry)
    }

    /// Per-entity totals: latest cumulative counters and summed increments.
    /// The requested field subset is not consulted.
    pub fn totals(filter: Filter, registry: &DatasetRegistry) -> Self {
        let mut group = entity_group(registry);
        group.output(LAST_UPDATED_FIELD, Accumulator::Max(LAST_UPDATED_FIELD));
        for metric in registry.cumulative {
            group.output(metric.output, Accumulator::Last(metric.source));
        }
        for metric in registry.incremental {
            group.output(metric.output, Accumulator::Sum(metric.source));
        }

        Self::grouped(filter, group, registry)
    }

    fn grouped(filter: Filter, group: GroupStage, registry: &DatasetRegistry) -> Self {
        Self::new(vec![
            Stage::Match(filter),
            Stage::Sort(vec![SortKey::asc(DATE_FIELD), SortKey::asc(registry.key_field)]),
            Stage::Group(group),
            Stage::Sort(vec![SortKey::asc(registry.key_field)]),
            Stage::Project(Projection::All),
        ])
    }
}

/// Group on the entity key with first-seen metadata and distinct sources
fn entity_group(registry: &DatasetRegistry) -> GroupStage {
    let mut group = GroupStage::new(registry.key_field);
    for &name in registry.metadata_fields {
        group.output(name, Accumulator::First(name));
    }
    group.output(SOURCES_FIELD, Accumulator::AddToSet(SOURCE_FIELD));
    group
}
