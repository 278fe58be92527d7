//! Field selection for list results
//!
//! A field subset containing `all` anywhere (any case) selects the full
//! record, as does an empty subset. Otherwise the subset is split on commas,
//! trimmed, and names the registry does not know are dropped without
//! complaint. The internal `_id` is never returned.

use crate::registry::DatasetRegistry;
use crate::value::Document;

/// Internal identity field of stored documents
pub const ID_FIELD: &str = "_id";

/// Document-shaping clause of a find
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Full record minus `_id`
    All,
    /// Only the listed fields. An empty list is executed like [`Projection::All`].
    Include(Vec<&'static str>),
}

impl Projection {
    pub fn build(subset: Option<&str>, registry: &DatasetRegistry) -> Self {
        match requested_fields(subset, registry) {
            Some(fields) => Projection::Include(fields),
            None => Projection::All,
        }
    }

    /// Shape a stored document. Fields keep their stored order.
    pub fn apply(&self, mut doc: Document) -> Document {
        match self {
            Projection::Include(fields) if !fields.is_empty() => {
                doc.retain(|name, _| fields.contains(&name.as_str()));
                doc
            }
            _ => {
                doc.shift_remove(ID_FIELD);
                doc
            }
        }
    }
}

/// Whether a subset string selects every field
pub fn selects_all(subset: Option<&str>) -> bool {
    match subset {
        None => true,
        Some(raw) => raw.trim().is_empty() || raw.to_lowercase().contains("all"),
    }
}

/// Registered fields named by a subset string, in request order and without
/// duplicates. `None` when the subset selects every field.
pub fn requested_fields(
    subset: Option<&str>,
    registry: &DatasetRegistry,
) -> Option<Vec<&'static str>> {
    if selects_all(subset) {
        return None;
    }

    let mut fields: Vec<&'static str> = Vec::new();
    for name in subset.unwrap_or_default().split(',').map(str::trim) {
        if let Some(known) = registry.valid_fields.iter().find(|f| **f == name) {
            if !fields.contains(known) {
                fields.push(*known);
            }
        }
    }
    Some(fields)
}
