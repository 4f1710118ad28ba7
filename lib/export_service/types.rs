use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::RateLimiter;
use serde::Serialize;
use std::sync::Arc;

use super::error::ExportError;
use crate::model::{
    BoundingBox, CanonicalRecord, FilterSnapshot, QualityGrade, RemoteRow, ResolvedWindow,
    RowPayload, SourceKind,
};

/// Request budget shared by every page fetch an adapter issues, including
/// relaxed retries. Injected at adapter construction so concurrent page
/// requests draw from the same allowance.
pub type SourceRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// A server-side predicate in source-agnostic form.
///
/// Each clause knows three things: the query parameters it pushes down, which
/// rejected parameter names belong to it, and how to evaluate itself against
/// a row when the server could not.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    TimeRange(ResolvedWindow),
    Region(BoundingBox),
    DeviceIds(Vec<String>),
    RequireImage,
    TaxonIds(Vec<i64>),
    Grade(QualityGrade),
    NameQuery(String),
}

impl FilterClause {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TimeRange(_) => "time_range",
            Self::Region(_) => "region",
            Self::DeviceIds(_) => "device_ids",
            Self::RequireImage => "require_image",
            Self::TaxonIds(_) => "taxon_ids",
            Self::Grade(_) => "quality_grade",
            Self::NameQuery(_) => "name_query",
        }
    }

    /// Query parameter keys this clause contributes. A gateway rejection
    /// names one of these.
    pub fn param_keys(&self) -> &'static [&'static str] {
        match self {
            Self::TimeRange(_) => &["from", "to"],
            Self::Region(_) => &["bbox"],
            Self::DeviceIds(_) => &["device_id"],
            Self::RequireImage => &["has_image"],
            Self::TaxonIds(_) => &["taxon_id"],
            Self::Grade(_) => &["quality_grade"],
            Self::NameQuery(_) => &["q"],
        }
    }

    pub fn owns_param(&self, param: &str) -> bool {
        self.param_keys().iter().any(|key| *key == param)
    }

    pub fn append_params(&self, params: &mut Vec<(String, String)>) {
        match self {
            Self::TimeRange(window) => {
                params.push(("from".to_string(), window.start.to_rfc3339()));
                params.push(("to".to_string(), window.end.to_rfc3339()));
            }
            Self::Region(bbox) => {
                params.push((
                    "bbox".to_string(),
                    format!(
                        "{},{},{},{}",
                        bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat
                    ),
                ));
            }
            Self::DeviceIds(ids) => {
                params.push(("device_id".to_string(), ids.join(",")));
            }
            Self::RequireImage => {
                params.push(("has_image".to_string(), "true".to_string()));
            }
            Self::TaxonIds(ids) => {
                let rendered: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                params.push(("taxon_id".to_string(), rendered.join(",")));
            }
            Self::Grade(grade) => {
                params.push(("quality_grade".to_string(), grade.as_param().to_string()));
            }
            Self::NameQuery(query) => {
                params.push(("q".to_string(), query.clone()));
            }
        }
    }

    /// Client-side evaluation of the predicate. Rows whose payload cannot
    /// answer the question fail closed.
    pub fn matches(&self, row: &RemoteRow) -> bool {
        match self {
            Self::TimeRange(window) => window.contains(row.observed_at),
            Self::Region(bbox) => match (row.longitude, row.latitude) {
                (Some(lon), Some(lat)) => bbox.contains(lon, lat),
                _ => false,
            },
            Self::DeviceIds(ids) => match &row.payload {
                RowPayload::CameraTrap { device_id, .. } => ids.iter().any(|id| id == device_id),
                _ => false,
            },
            Self::RequireImage => matches!(
                &row.payload,
                RowPayload::CameraTrap {
                    image_url: Some(_),
                    ..
                }
            ),
            Self::TaxonIds(ids) => match &row.payload {
                RowPayload::Occurrence {
                    taxon_id: Some(taxon_id),
                    ..
                } => ids.contains(taxon_id),
                _ => false,
            },
            Self::Grade(grade) => match &row.payload {
                RowPayload::Occurrence {
                    quality_grade: Some(row_grade),
                    ..
                } => row_grade.eq_ignore_ascii_case(grade.as_param()),
                _ => false,
            },
            Self::NameQuery(query) => match &row.payload {
                RowPayload::Occurrence {
                    scientific_name,
                    common_name,
                    ..
                } => {
                    let needle = query.to_lowercase();
                    scientific_name.to_lowercase().contains(&needle)
                        || common_name
                            .as_deref()
                            .map(|name| name.to_lowercase().contains(&needle))
                            .unwrap_or(false)
                }
                _ => false,
            },
        }
    }
}

pub fn clause_params(clauses: &[FilterClause]) -> Vec<(String, String)> {
    let mut params = Vec::new();
    for clause in clauses {
        clause.append_params(&mut params);
    }
    params
}

/// One page request against a source, expressed in raw row offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u32,
}

/// Everything the paginator needs to replay one snapshot.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub source: SourceKind,
    pub clauses: Vec<FilterClause>,
    /// The resolved window, anchored at replay time. Kept alongside the
    /// clauses so client-side re-filtering uses the same instant.
    pub window: ResolvedWindow,
    /// Raw-row fetch budget before aggregation.
    pub max_records: u64,
}

/// Controls how many raw rows a replay may fetch for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingPolicy {
    /// Overfetch fraction for narrow queries.
    pub narrow_fraction: f64,
    /// Minimum absolute buffer for narrow queries.
    pub narrow_floor: u64,
    /// Flat buffer for broad queries.
    pub broad_buffer: u64,
    /// Absolute cap on raw rows per snapshot.
    pub hard_ceiling: u64,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self {
            narrow_fraction: 0.10,
            narrow_floor: 50,
            broad_buffer: 100,
            hard_ceiling: 10_000,
        }
    }
}

impl SizingPolicy {
    /// Fetch budget for one snapshot: the estimate plus an overfetch buffer
    /// (duplicates and client-side filtering eat into the raw rows), capped
    /// at the hard ceiling.
    pub fn budget(&self, estimated_count: u64, narrow: bool) -> u64 {
        let buffer = if narrow {
            let fractional = (estimated_count as f64 * self.narrow_fraction).ceil() as u64;
            fractional.max(self.narrow_floor)
        } else {
            self.broad_buffer
        };
        estimated_count
            .saturating_add(buffer)
            .min(self.hard_ceiling)
    }
}

/// Page-loop limits shared by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingPolicy {
    pub page_size: u32,
    /// Circuit breaker: hard cap on pages per snapshot. Hitting it stops the
    /// fetch and marks the export partial instead of failing it.
    pub max_pages: u32,
}

impl Default for PagingPolicy {
    fn default() -> Self {
        Self {
            page_size: 1000,
            max_pages: 50,
        }
    }
}

/// Service-level knobs for one `ExportService` instance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExportOptions {
    pub sizing: SizingPolicy,
    pub paging: PagingPolicy,
    /// When a replay fails on the network, export the snapshot's cached
    /// preview sample instead of failing the item.
    pub preview_fallback: bool,
}

/// Aggregated records plus the facts reconciliation needs.
#[derive(Debug)]
pub struct WorkingSet {
    pub records: Vec<CanonicalRecord>,
    pub page_limit_exceeded: bool,
    pub relaxed: Option<FilterClause>,
}

/// Non-fatal facts about an export item, surfaced to the user alongside the
/// output. Annotations never fail an item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportAnnotation {
    FilterRelaxed { filter: String },
    PaginationLimitExceeded { pages: u32 },
    CountMismatch { expected: u64, actual: u64 },
    PreviewFallback,
}

impl ExportAnnotation {
    pub fn describe(&self) -> String {
        match self {
            Self::FilterRelaxed { filter } => {
                format!("source rejected `{filter}`; filter applied client-side")
            }
            Self::PaginationLimitExceeded { pages } => {
                format!("stopped after {pages} pages; results may be partial")
            }
            Self::CountMismatch { expected, actual } => {
                format!("count changed since commit: showed {expected}, replay found {actual}")
            }
            Self::PreviewFallback => {
                "source unreachable; exported the cached preview sample".to_string()
            }
        }
    }
}

/// Outcome of exporting one snapshot.
#[derive(Debug)]
pub struct ExportItemReport {
    pub snapshot_id: String,
    pub source: SourceKind,
    pub exported: u64,
    pub annotations: Vec<ExportAnnotation>,
    pub error: Option<ExportError>,
}

impl ExportItemReport {
    pub(crate) fn failed(snapshot: &FilterSnapshot, error: ExportError) -> Self {
        Self {
            snapshot_id: snapshot.id.clone(),
            source: snapshot.source(),
            exported: 0,
            annotations: Vec::new(),
            error: Some(error),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of one full export run.
#[derive(Debug)]
pub struct ExportRunSummary {
    pub reports: Vec<ExportItemReport>,
    /// True when the run was superseded or interrupted; items after the
    /// cancellation point were never attempted.
    pub cancelled: bool,
}

impl ExportRunSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn narrow_budget_applies_floor_then_fraction() {
        let sizing = SizingPolicy::default();
        // 10% of 100 is 10, under the floor of 50.
        assert_eq!(sizing.budget(100, true), 150);
        // 10% of 2000 is 200, over the floor.
        assert_eq!(sizing.budget(2000, true), 2200);
    }

    #[test]
    fn broad_budget_uses_flat_buffer() {
        let sizing = SizingPolicy::default();
        assert_eq!(sizing.budget(100, false), 200);
        assert_eq!(sizing.budget(0, false), 100);
    }

    #[test]
    fn budget_is_capped_by_hard_ceiling() {
        let sizing = SizingPolicy::default();
        assert_eq!(sizing.budget(50_000, false), 10_000);
        assert_eq!(sizing.budget(u64::MAX, true), 10_000);
    }

    #[test]
    fn clause_params_cover_every_key() {
        let window = ResolvedWindow {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        };
        let clauses = vec![
            FilterClause::TimeRange(window),
            FilterClause::DeviceIds(vec!["d1".to_string(), "d2".to_string()]),
            FilterClause::RequireImage,
        ];

        let params = clause_params(&clauses);
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["from", "to", "device_id", "has_image"]);

        let device_param = &params[2].1;
        assert_eq!(device_param, "d1,d2");
    }

    #[test]
    fn every_clause_owns_its_rejection_params() {
        let window = ResolvedWindow {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        };
        assert!(FilterClause::TimeRange(window).owns_param("from"));
        assert!(FilterClause::TimeRange(window).owns_param("to"));
        assert!(FilterClause::Grade(QualityGrade::Research).owns_param("quality_grade"));
        assert!(!FilterClause::RequireImage.owns_param("bbox"));
    }

    #[test]
    fn region_clause_fails_closed_without_coordinates() {
        let bbox = BoundingBox {
            min_lon: 0.0,
            min_lat: 0.0,
            max_lon: 10.0,
            max_lat: 10.0,
        };
        let row = RemoteRow {
            entity_id: "m-1".to_string(),
            observed_at: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            latitude: None,
            longitude: None,
            payload: RowPayload::CameraTrap {
                device_id: "d1".to_string(),
                labels: vec![],
                image_url: None,
            },
        };
        assert!(!FilterClause::Region(bbox).matches(&row));
    }

    #[test]
    fn name_query_matches_common_and_scientific_names() {
        let row = RemoteRow {
            entity_id: "o-1".to_string(),
            observed_at: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            latitude: None,
            longitude: None,
            payload: RowPayload::Occurrence {
                taxon_id: Some(42),
                scientific_name: "Lynx lynx".to_string(),
                common_name: Some("Eurasian lynx".to_string()),
                quality_grade: None,
            },
        };
        assert!(FilterClause::NameQuery("lynx".to_string()).matches(&row));
        assert!(FilterClause::NameQuery("EURASIAN".to_string()).matches(&row));
        assert!(!FilterClause::NameQuery("wolf".to_string()).matches(&row));
    }
}
