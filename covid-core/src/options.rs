//! Filter specification and the builder that produces it from raw request
//! parameters.
//!
//! Input handling is permissive on purpose: dates that do not parse leave
//! their bound unset, and a spatial key of `all` (any case) or an empty one
//! means "every entity". Nothing here ever fails.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::time::parse_day;

/// Per-request filter specification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    /// Entity key as supplied; `None` means no restriction
    pub entity_key: Option<String>,
    /// Raw comma-separated field list; `None` means the full shape
    pub field_subset: Option<String>,
    /// Inclusive lower date bound
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper date bound
    pub date_to: Option<DateTime<Utc>>,
    /// Accepted for compatibility with existing callers but never applied to
    /// any query.
    pub limit: Option<usize>,
}

impl FilterSpec {
    pub fn builder() -> FilterSpecBuilder {
        FilterSpecBuilder::default()
    }

    /// Whether either date bound was supplied. Without one, queries fall back
    /// to the current UTC day.
    pub fn has_date_bounds(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some()
    }
}

/// Builder for [`FilterSpec`] taking raw strings as they arrive from a
/// request path or query string.
#[derive(Debug, Default)]
pub struct FilterSpecBuilder {
    spec: FilterSpec,
}

impl FilterSpecBuilder {
    /// Restrict to one entity. Empty and `all` (case-insensitive) clear the
    /// restriction.
    pub fn entity_key(mut self, raw: &str) -> Self {
        let trimmed = raw.trim();
        self.spec.entity_key = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    /// Comma-separated list of fields to return
    pub fn fields(mut self, raw: &str) -> Self {
        let trimmed = raw.trim();
        self.spec.field_subset = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Lower bound as `YYYY-MM-DD`; ignored if it does not parse
    pub fn from(mut self, raw: &str) -> Self {
        match parse_day(raw) {
            Some(day) => self.spec.date_from = Some(day),
            None => debug!(raw, "ignoring unparsable 'from' date"),
        }
        self
    }

    /// Upper bound as `YYYY-MM-DD`; ignored if it does not parse
    pub fn to(mut self, raw: &str) -> Self {
        match parse_day(raw) {
            Some(day) => self.spec.date_to = Some(day),
            None => debug!(raw, "ignoring unparsable 'to' date"),
        }
        self
    }

    pub fn from_date(mut self, date: DateTime<Utc>) -> Self {
        self.spec.date_from = Some(date);
        self
    }

    pub fn to_date(mut self, date: DateTime<Utc>) -> Self {
        self.spec.date_to = Some(date);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    pub fn build(self) -> FilterSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_day;

    #[test]
    fn test_all_or_empty_key_means_unrestricted() {
        for raw in ["", "  ", "all", "ALL", "All"] {
            let spec = FilterSpec::builder().entity_key(raw).build();
            assert_eq!(spec.entity_key, None, "key {raw:?}");
        }

        let spec = FilterSpec::builder().entity_key(" grc ").build();
        assert_eq!(spec.entity_key.as_deref(), Some("grc"));

        // only an exact "all" clears the key
        let spec = FilterSpec::builder().entity_key("ballot").build();
        assert_eq!(spec.entity_key.as_deref(), Some("ballot"));
    }

    #[test]
    fn test_unparsable_dates_are_ignored() {
        let spec = FilterSpec::builder()
            .from("2021-13-01")
            .to("not-a-date")
            .build();
        assert_eq!(spec.date_from, None);
        assert_eq!(spec.date_to, None);
        assert!(!spec.has_date_bounds());
    }

    #[test]
    fn test_single_bound_counts_as_bounded() {
        let spec = FilterSpec::builder().to("2021-01-31").build();
        assert_eq!(spec.date_from, None);
        assert_eq!(spec.date_to, parse_day("2021-01-31"));
        assert!(spec.has_date_bounds());
    }

    #[test]
    fn test_later_valid_bound_is_not_cleared_by_garbage() {
        let spec = FilterSpec::builder()
            .from("2021-01-01")
            .from("garbage")
            .build();
        assert_eq!(spec.date_from, parse_day("2021-01-01"));
    }

    #[test]
    fn test_fields_and_limit_are_carried() {
        let spec = FilterSpec::builder()
            .fields(" cases,deaths ")
            .limit(10)
            .build();
        assert_eq!(spec.field_subset.as_deref(), Some("cases,deaths"));
        assert_eq!(spec.limit, Some(10));

        assert_eq!(FilterSpec::builder().fields("").build().field_subset, None);
    }
}
