//! Report query parameters
//!
//! [`QueryParams`] is the record callers hand in (CLI flags, JSON documents,
//! library code). Required fields are `Option`s at this level so that
//! [`QueryParams::validate`] can report the first one that is missing, in the
//! same order the reporting API documents them.
//!
//! A successful validation yields a [`ReportQuery`]: every required field is
//! present, dates are parsed and filter clauses are canonicalized. The
//! cache-relevant projection of a query is its [`Fingerprint`], which leaves
//! out the identity/quota key by construction.

use std::{fmt, str::FromStr};

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::errors::QueryError;

/// Required parameters, in the order they are checked
pub const REQUIRED_FIELDS: &[&str] = &[
    "startDate",
    "endDate",
    "metrics",
    "dimensions",
    "filters",
    "pageSize",
];

/// Identity used for token storage when a query has no quota key
pub const DEFAULT_IDENTITY: &str = "default";

// ============================================================================
// ReportDate
// ============================================================================

/// A date as accepted by the reporting API.
///
/// Besides absolute `YYYY-MM-DD` dates the API understands `today`,
/// `yesterday` and `NdaysAgo`; those are kept symbolic so that they are sent
/// (and fingerprinted) exactly as written, and only resolved when a calendar
/// date is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportDate {
    /// A fixed calendar date
    Absolute(NaiveDate),
    /// The current day
    Today,
    /// The day before the current day
    Yesterday,
    /// `N` days before the current day
    DaysAgo(u32),
}

impl ReportDate {
    /// Resolves the date against the given current day
    pub fn resolve(&self, today: NaiveDate) -> NaiveDate {
        match *self {
            Self::Absolute(date) => date,
            Self::Today => today,
            Self::Yesterday => today.checked_sub_days(Days::new(1)).unwrap_or(NaiveDate::MIN),
            Self::DaysAgo(n) => today
                .checked_sub_days(Days::new(u64::from(n)))
                .unwrap_or(NaiveDate::MIN),
        }
    }
}

impl FromStr for ReportDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "today" => return Ok(Self::Today),
            "yesterday" => return Ok(Self::Yesterday),
            _ => {}
        }

        if let Some(days) = s.strip_suffix("daysAgo") {
            return days
                .parse::<u32>()
                .map(Self::DaysAgo)
                .map_err(|_| format!("'{s}' is not a valid NdaysAgo date"));
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self::Absolute)
            .map_err(|e| format!("'{s}' is not a YYYY-MM-DD date ({e})"))
    }
}

impl fmt::Display for ReportDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Today => f.write_str("today"),
            Self::Yesterday => f.write_str("yesterday"),
            Self::DaysAgo(n) => write!(f, "{n}daysAgo"),
        }
    }
}

impl Serialize for ReportDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// MonthMarker
// ============================================================================

/// A `YYYY-MM` month marker (the created-date field).
///
/// For calendar comparisons the marker stands for day 2 of its month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthMarker(NaiveDate);

impl MonthMarker {
    /// Creates a marker for the given year and month
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 2).map(Self)
    }

    /// The date this marker stands for (day 2 of the month)
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Calendar year of the marker
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Calendar month of the marker (1-12)
    pub fn month(&self) -> u32 {
        self.0.month()
    }
}

impl FromStr for MonthMarker {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NaiveDate::parse_from_str(&format!("{s}-02"), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| format!("'{s}' is not a YYYY-MM month"))
    }
}

impl fmt::Display for MonthMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

impl Serialize for MonthMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// QueryParams
// ============================================================================

/// Caller-supplied query parameters, before validation.
///
/// Field names follow the reporting API's camelCase spelling so that a JSON
/// document like `{"startDate": "2024-01-01", "pageSize": 100, ...}`
/// deserializes directly. Empty strings and a zero page size count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParams {
    /// Identity / quota key; selects the stored credential and is sent as `quotaUser`
    #[serde(default, rename = "quotaID", alias = "quotaId")]
    pub quota_id: Option<String>,
    /// Reporting view identifier
    #[serde(default)]
    pub view_id: Option<String>,
    /// First day of the reporting range
    #[serde(default)]
    pub start_date: Option<String>,
    /// Last day of the reporting range (the "visited" date)
    #[serde(default)]
    pub end_date: Option<String>,
    /// `YYYY-MM` month marker of when the tracked entity was created
    #[serde(default)]
    pub created_date: Option<String>,
    /// Metric expression
    #[serde(default)]
    pub metrics: Option<String>,
    /// Dimension name
    #[serde(default)]
    pub dimensions: Option<String>,
    /// Dimension filter clauses, passed through untouched
    #[serde(default)]
    pub filters: Option<Vec<Value>>,
    /// Maximum number of rows per report
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl QueryParams {
    /// Creates an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota_id(mut self, quota_id: impl Into<String>) -> Self {
        self.quota_id = Some(quota_id.into());
        self
    }

    pub fn with_view_id(mut self, view_id: impl Into<String>) -> Self {
        self.view_id = Some(view_id.into());
        self
    }

    pub fn with_dates(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_date = Some(start.into());
        self.end_date = Some(end.into());
        self
    }

    pub fn with_created_date(mut self, created: impl Into<String>) -> Self {
        self.created_date = Some(created.into());
        self
    }

    pub fn with_metrics(mut self, metrics: impl Into<String>) -> Self {
        self.metrics = Some(metrics.into());
        self
    }

    pub fn with_dimensions(mut self, dimensions: impl Into<String>) -> Self {
        self.dimensions = Some(dimensions.into());
        self
    }

    pub fn with_filters(mut self, filters: Vec<Value>) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Returns the first required field that is absent or empty, if any.
    ///
    /// Fields are checked in [`REQUIRED_FIELDS`] order.
    pub fn first_missing(&self) -> Option<&'static str> {
        REQUIRED_FIELDS.iter().copied().find(|field| match *field {
            "startDate" => non_empty(&self.start_date).is_none(),
            "endDate" => non_empty(&self.end_date).is_none(),
            "metrics" => non_empty(&self.metrics).is_none(),
            "dimensions" => non_empty(&self.dimensions).is_none(),
            "filters" => self.filters.is_none(),
            "pageSize" => !matches!(self.page_size, Some(n) if n > 0),
            _ => false,
        })
    }

    /// Validates the parameters and produces a [`ReportQuery`].
    ///
    /// # Errors
    ///
    /// - [`QueryError::MissingArgument`] for the first absent required field
    /// - [`QueryError::InvalidArgument`] when a date or month marker does not parse
    pub fn validate(&self) -> Result<ReportQuery, QueryError> {
        if let Some(field) = self.first_missing() {
            return Err(QueryError::MissingArgument(field));
        }

        let start_date = parse_field("startDate", &self.start_date)?;
        let end_date = parse_field("endDate", &self.end_date)?;
        let created_date = match non_empty(&self.created_date) {
            Some(raw) => Some(raw.parse::<MonthMarker>().map_err(|reason| {
                QueryError::InvalidArgument {
                    field: "createdDate",
                    reason,
                }
            })?),
            None => None,
        };

        let filters = self
            .filters
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(canonicalize)
            .collect();

        Ok(ReportQuery {
            quota_id: non_empty(&self.quota_id).map(str::to_string),
            view_id: non_empty(&self.view_id).map(str::to_string),
            start_date,
            end_date,
            created_date,
            metrics: non_empty(&self.metrics).unwrap_or_default().to_string(),
            dimensions: non_empty(&self.dimensions).unwrap_or_default().to_string(),
            filters,
            page_size: self.page_size.unwrap_or_default(),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_field(field: &'static str, value: &Option<String>) -> Result<ReportDate, QueryError> {
    non_empty(value)
        .ok_or(QueryError::MissingArgument(field))?
        .parse()
        .map_err(|reason| QueryError::InvalidArgument { field, reason })
}

/// Rebuilds a JSON value with every object's keys in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

// ============================================================================
// ReportQuery
// ============================================================================

/// A validated report query
#[derive(Debug, Clone, PartialEq)]
pub struct ReportQuery {
    pub quota_id: Option<String>,
    pub view_id: Option<String>,
    pub start_date: ReportDate,
    pub end_date: ReportDate,
    pub created_date: Option<MonthMarker>,
    pub metrics: String,
    pub dimensions: String,
    /// Filter clauses with object keys in canonical (sorted) order
    pub filters: Vec<Value>,
    pub page_size: u32,
}

impl ReportQuery {
    /// Identity whose credential is used for this query
    pub fn identity(&self) -> &str {
        self.quota_id.as_deref().unwrap_or(DEFAULT_IDENTITY)
    }

    /// The cache-relevant projection of this query
    pub fn fingerprint(&self) -> Fingerprint<'_> {
        Fingerprint {
            view_id: self.view_id.as_deref(),
            start_date: self.start_date,
            end_date: self.end_date,
            created_date: self.created_date,
            metrics: &self.metrics,
            filters: &self.filters,
            dimensions: &self.dimensions,
            page_size: self.page_size,
        }
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Cache-relevant fields of a query, in canonical order.
///
/// The identity/quota key and the credential are not fields of this record,
/// so two queries that differ only in those produce the same fingerprint.
/// Absent optional fields and an empty filter list are omitted from the
/// serialized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    view_id: Option<&'a str>,
    start_date: ReportDate,
    end_date: ReportDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_date: Option<MonthMarker>,
    metrics: &'a str,
    #[serde(skip_serializing_if = "is_empty_slice")]
    filters: &'a [Value],
    dimensions: &'a str,
    page_size: u32,
}

fn is_empty_slice(filters: &&[Value]) -> bool {
    filters.is_empty()
}

impl Fingerprint<'_> {
    /// Canonical byte serialization used as hash input
    pub fn canonical_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
