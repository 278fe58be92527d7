//! Translation of a filter specification into a point query filter

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

use crate::options::FilterSpec;
use crate::registry::{DatasetRegistry, KeyKind};
use crate::time::DayWindow;
use crate::value::{field, Document, Value};

/// Field holding the daily time axis in every dataset
pub const DATE_FIELD: &str = "date";

/// Exact match on the dataset's entity key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    pub field: &'static str,
    pub value: Value,
}

/// Condition on the `date` field
#[derive(Debug, Clone, PartialEq)]
pub enum DateCondition {
    /// No bounds were supplied: only documents dated on this day match
    Day(DayWindow),
    /// Caller-supplied bounds, both inclusive. At least one is set.
    Range {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
}

impl DateCondition {
    pub fn matches(&self, date: DateTime<Utc>) -> bool {
        match self {
            DateCondition::Day(window) => window.contains(date),
            DateCondition::Range { from, to } => {
                from.map_or(true, |from| date >= from) && to.map_or(true, |to| date <= to)
            }
        }
    }
}

/// Query filter produced for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub entity: Option<KeyCondition>,
    pub date: DateCondition,
}

impl Filter {
    /// Translate against the current UTC day
    pub fn translate(spec: &FilterSpec, registry: &DatasetRegistry) -> Self {
        Self::translate_at(spec, registry, Utc::now().date_naive())
    }

    /// Translate with an explicit notion of "today".
    ///
    /// Supplying either date bound replaces the day window entirely; the
    /// bounds are not intersected with today.
    pub fn translate_at(spec: &FilterSpec, registry: &DatasetRegistry, today: NaiveDate) -> Self {
        let entity = spec.entity_key.as_deref().map(|raw| KeyCondition {
            field: registry.key_field,
            value: normalize_key(raw, registry.key_kind),
        });

        let date = if spec.has_date_bounds() {
            DateCondition::Range {
                from: spec.date_from,
                to: spec.date_to,
            }
        } else {
            DateCondition::Day(DayWindow::for_day(today))
        };

        Self { entity, date }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(key) = &self.entity {
            if !field(doc, key.field).loosely_equals(&key.value) {
                return false;
            }
        }

        match field(doc, DATE_FIELD) {
            Value::Date(date) => self.date.matches(*date),
            _ => false,
        }
    }
}

fn normalize_key(raw: &str, kind: KeyKind) -> Value {
    match kind {
        KeyKind::Code => Value::String(raw.to_uppercase()),
        KeyKind::Numeric => match raw.parse::<i64>() {
            Ok(id) => Value::Int(id),
            Err(_) => Value::String(raw.to_uppercase()),
        },
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(key) = &self.entity {
            write!(f, "{} = {:?}, ", key.field, key.value)?;
        }
        match &self.date {
            DateCondition::Day(window) => write!(f, "date in {window}"),
            DateCondition::Range { from, to } => {
                let from = from.map(|d| d.to_rfc3339()).unwrap_or_else(|| "..".into());
                let to = to.map(|d| d.to_rfc3339()).unwrap_or_else(|| "..".into());
                write!(f, "date in [{from}, {to}]")
            }
        }
    }
}
