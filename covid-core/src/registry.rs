//! Per-dataset field registries
//!
//! A registry is everything a dataset has to supply to be served: where its
//! documents live, what identifies an entity, which fields callers may
//! select, and which metrics the series and totals aggregations emit by
//! default. Membership tests are exact and case-sensitive; unknown names are
//! dropped by callers, never reported.

use std::fmt;

/// The three served datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    /// Countries of the world
    Global,
    /// Greek regions
    Regional,
    /// Greek vaccination sites
    Vaccination,
}

/// How a caller-supplied entity key is normalized before matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Code-like string key, matched upper-cased
    Code,
    /// Integer key, matched numerically
    Numeric,
}

/// A cumulative or incremental metric emitted by the totals aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalMetric {
    /// Field read from the daily documents
    pub source: &'static str,
    /// Field written to the aggregated record
    pub output: &'static str,
}

const fn total(source: &'static str, output: &'static str) -> TotalMetric {
    TotalMetric { source, output }
}

/// Static description of one dataset
#[derive(Debug)]
pub struct DatasetRegistry {
    pub dataset: Dataset,
    /// Name of the backing collection
    pub collection: &'static str,
    /// Field holding the entity key; also the secondary sort key of lists
    pub key_field: &'static str,
    pub key_kind: KeyKind,
    /// Entity metadata carried first-seen-wins through aggregations
    pub metadata_fields: &'static [&'static str],
    /// Fields callers may project or aggregate, in declaration order
    pub valid_fields: &'static [&'static str],
    /// Fields aggregated into daily series when no subset is requested
    pub default_series: &'static [&'static str],
    /// Running totals; the totals aggregation keeps the latest value
    pub cumulative: &'static [TotalMetric],
    /// Daily deltas; the totals aggregation sums them over the range
    pub incremental: &'static [TotalMetric],
}

impl DatasetRegistry {
    /// Exact-match membership test against the registry's field list
    pub fn is_valid_field(&self, name: &str) -> bool {
        self.valid_fields.iter().any(|field| *field == name)
    }
}

static GLOBAL: DatasetRegistry = DatasetRegistry {
    dataset: Dataset::Global,
    collection: "global",
    key_field: "iso3",
    key_kind: KeyKind::Code,
    metadata_fields: &["uid", "country", "iso2", "iso3", "loc", "population"],
    valid_fields: &[
        "date",
        "uid",
        "country",
        "iso2",
        "iso3",
        "loc",
        "population",
        "cases",
        "deaths",
        "recovered",
        "active",
        "critical",
        "tests",
        "new_cases",
        "new_deaths",
        "new_recovered",
        "case_fatality_ratio",
        "incidence_rate",
        "source",
        "cumulative_rtpcr_tests_raw",
        "estimated_new_rtpcr_tests",
        "cumulative_rapid_tests_raw",
        "estimated_new_rapid_tests",
        "estimated_new_total_tests",
    ],
    default_series: &[
        "new_cases",
        "new_deaths",
        "cases",
        "deaths",
        "recovered",
        "active",
        "critical",
    ],
    cumulative: &[
        total("cases", "total_cases"),
        total("deaths", "total_deaths"),
        total("recovered", "total_recovered"),
        total("active", "total_active"),
        total("critical", "total_critical"),
        total("tests", "total_tests"),
    ],
    incremental: &[
        total("new_cases", "cases"),
        total("new_deaths", "deaths"),
        total("new_recovered", "recovered"),
        total("estimated_new_total_tests", "tests"),
    ],
};

static REGIONAL: DatasetRegistry = DatasetRegistry {
    dataset: Dataset::Regional,
    collection: "greece",
    key_field: "uid",
    key_kind: KeyKind::Numeric,
    metadata_fields: &[
        "uid",
        "region",
        "country",
        "iso2",
        "iso3",
        "loc",
        "population",
    ],
    valid_fields: &[
        "date",
        "uid",
        "region",
        "country",
        "iso2",
        "iso3",
        "loc",
        "population",
        "cases",
        "deaths",
        "recovered",
        "active",
        "critical",
        "tests",
        "hospital_admissions",
        "hospital_discharges",
        "intubated",
        "new_cases",
        "new_deaths",
        "new_recovered",
        "new_tests",
        "case_fatality_ratio",
        "incidence_rate",
        "source",
    ],
    default_series: &[
        "new_cases",
        "new_deaths",
        "cases",
        "deaths",
        "recovered",
        "active",
        "critical",
    ],
    cumulative: &[
        total("cases", "total_cases"),
        total("deaths", "total_deaths"),
        total("recovered", "total_recovered"),
        total("active", "total_active"),
        total("critical", "total_critical"),
        total("tests", "total_tests"),
        total("hospital_admissions", "total_hospital_admissions"),
        total("hospital_discharges", "total_hospital_discharges"),
        total("intubated", "total_intubated"),
    ],
    incremental: &[
        total("new_cases", "cases"),
        total("new_deaths", "deaths"),
        total("new_recovered", "recovered"),
        total("new_tests", "tests"),
    ],
};

static VACCINATION: DatasetRegistry = DatasetRegistry {
    dataset: Dataset::Vaccination,
    collection: "gr_vaccines",
    key_field: "uid",
    key_kind: KeyKind::Code,
    metadata_fields: &["uid", "geo_unit", "state", "region", "loc", "population"],
    valid_fields: &[
        "date",
        "uid",
        "geo_unit",
        "state",
        "region",
        "loc",
        "population",
        "source",
        "total_distinct_persons",
        "total_vaccinations",
        "day_total",
        "day_diff",
        "new_total_distinct_persons",
        "new_total_vaccinations",
    ],
    default_series: &[
        "day_diff",
        "day_total",
        "total_distinct_persons",
        "total_vaccinations",
        "new_total_distinct_persons",
        "new_total_vaccinations",
    ],
    cumulative: &[
        total("total_distinct_persons", "total_distinct_persons"),
        total("total_vaccinations", "total_vaccinations"),
    ],
    incremental: &[
        total("day_diff", "day_diff"),
        total("day_total", "day_total"),
        total("new_total_distinct_persons", "new_total_distinct_persons"),
        total("new_total_vaccinations", "new_total_vaccinations"),
    ],
};

impl Dataset {
    pub const ALL: [Dataset; 3] = [Dataset::Global, Dataset::Regional, Dataset::Vaccination];

    /// The dataset's registry
    pub fn registry(self) -> &'static DatasetRegistry {
        match self {
            Dataset::Global => &GLOBAL,
            Dataset::Regional => &REGIONAL,
            Dataset::Vaccination => &VACCINATION,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dataset::Global => "global",
            Dataset::Regional => "regional",
            Dataset::Vaccination => "vaccination",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact-match membership test against a dataset's field list
pub fn is_valid_field(name: &str, dataset: Dataset) -> bool {
    dataset.registry().is_valid_field(name)
}
