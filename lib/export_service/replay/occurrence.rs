use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use super::super::error::PageFetchError;
use super::super::types::{
    FetchPlan, FilterClause, PageRequest, SizingPolicy, SourceRateLimiter,
};
use super::adapter::{page_params, SourceAdapter};
use super::error_mapping::map_gateway_error;
use crate::model::{
    CoreFilters, CustomFilters, FilterSnapshot, RemoteRow, ResolvedWindow, RowPayload, SourceKind,
};
use crate::source_client::{GatewayClient, OccurrenceRow};

/// Fan-out used when none is configured. Occurrence queries routinely page
/// deep, and the aggregation service tolerates a few concurrent readers.
pub const DEFAULT_OCCURRENCE_FAN_OUT: usize = 4;

/// Replays occurrence snapshots against `/v1/occurrences`.
pub struct OccurrenceAdapter {
    client: GatewayClient,
    rate_limiter: SourceRateLimiter,
    fan_out: usize,
}

impl OccurrenceAdapter {
    pub fn new(client: GatewayClient, rate_limiter: SourceRateLimiter, fan_out: usize) -> Self {
        Self {
            client,
            rate_limiter,
            fan_out: fan_out.max(1),
        }
    }
}

/// Push-down clauses for an occurrence query. Month-of-year filters have no
/// wire form and are evaluated client-side only.
pub fn occurrence_clauses(
    core: &CoreFilters,
    custom: &CustomFilters,
    now: DateTime<Utc>,
) -> (Vec<FilterClause>, ResolvedWindow) {
    let window = core.window.resolve(now);
    let mut clauses = vec![FilterClause::TimeRange(window)];
    if let Some(bbox) = core.bbox {
        clauses.push(FilterClause::Region(bbox));
    }
    if let CustomFilters::Occurrence {
        taxon_ids,
        quality_grade,
        name_query,
        ..
    } = custom
    {
        if !taxon_ids.is_empty() {
            clauses.push(FilterClause::TaxonIds(taxon_ids.clone()));
        }
        if let Some(grade) = quality_grade {
            clauses.push(FilterClause::Grade(*grade));
        }
        if let Some(query) = name_query {
            if !query.trim().is_empty() {
                clauses.push(FilterClause::NameQuery(query.clone()));
            }
        }
    }
    (clauses, window)
}

/// Taxon pins and name searches mark a query narrow; grade and month filters
/// alone still sweep broad slices of the dataset.
pub fn occurrence_is_narrow(custom: &CustomFilters) -> bool {
    matches!(
        custom,
        CustomFilters::Occurrence {
            taxon_ids,
            name_query,
            ..
        } if !taxon_ids.is_empty()
            || name_query.as_deref().map(|q| !q.trim().is_empty()).unwrap_or(false)
    )
}

pub(crate) fn occurrence_to_remote(row: OccurrenceRow) -> RemoteRow {
    RemoteRow {
        entity_id: row.occurrence_id,
        observed_at: row.observed_at,
        latitude: row.latitude,
        longitude: row.longitude,
        payload: RowPayload::Occurrence {
            taxon_id: row.taxon_id,
            scientific_name: row.scientific_name,
            common_name: row.common_name,
            quality_grade: row.quality_grade,
        },
    }
}

impl SourceAdapter for OccurrenceAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Occurrence
    }

    fn build_plan(
        &self,
        snapshot: &FilterSnapshot,
        now: DateTime<Utc>,
        sizing: &SizingPolicy,
    ) -> FetchPlan {
        let (clauses, window) = occurrence_clauses(&snapshot.core, &snapshot.custom, now);
        FetchPlan {
            source: SourceKind::Occurrence,
            max_records: sizing.budget(
                snapshot.estimated_count,
                occurrence_is_narrow(&snapshot.custom),
            ),
            clauses,
            window,
        }
    }

    fn fetch_page<'a>(
        &'a self,
        clauses: &'a [FilterClause],
        request: PageRequest,
    ) -> BoxFuture<'a, Result<Vec<RemoteRow>, PageFetchError>> {
        Box::pin(async move {
            self.rate_limiter.until_ready().await;
            let params = page_params(clauses, request);
            let page = self
                .client
                .fetch_occurrences(&params)
                .await
                .map_err(map_gateway_error)?;
            Ok(page.rows.into_iter().map(occurrence_to_remote).collect())
        })
    }

    fn fan_out(&self) -> usize {
        self.fan_out
    }
}
