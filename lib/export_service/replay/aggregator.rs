use std::collections::HashSet;

use chrono::Datelike;
use tracing::debug;

use super::super::types::FilterClause;
use crate::model::{
    CanonicalRecord, CustomFilters, FilterSnapshot, RemoteRow, ResolvedWindow, RowPayload,
};

/// Labels and names that never leave the pipeline, regardless of user
/// filters. These cover people and their vehicles; field cameras capture
/// them constantly and they must not end up in shared exports. Matching is
/// case-insensitive and exact per term.
const STANDING_EXCLUSIONS: &[&str] = &["human", "person", "people", "vehicle", "homo sapiens"];

/// Collapses raw pages into canonical records.
///
/// The pass order is fixed:
/// 1. drop duplicate entity ids, first occurrence wins, input order kept
/// 2. drop standing exclusions
/// 3. re-apply a relaxed clause client-side, when one was dropped
/// 4. re-apply the snapshot's own filters
///
/// Step 4 repeats work the source already did for pushed-down clauses. That
/// is intentional: the re-application is idempotent on correctly filtered
/// rows, and it catches both source-side filtering gaps and rows a relaxed
/// fetch let through.
pub fn aggregate(
    rows: Vec<RemoteRow>,
    snapshot: &FilterSnapshot,
    window: ResolvedWindow,
    relaxed: Option<&FilterClause>,
) -> Vec<CanonicalRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());
    let mut duplicates = 0usize;
    let mut excluded = 0usize;
    let mut filtered = 0usize;
    let mut records = Vec::with_capacity(rows.len());

    for row in rows {
        if !seen.insert(row.entity_id.clone()) {
            duplicates += 1;
            continue;
        }
        if is_standing_excluded(&row) {
            excluded += 1;
            continue;
        }
        if let Some(clause) = relaxed {
            if !clause.matches(&row) {
                filtered += 1;
                continue;
            }
        }
        if !passes_snapshot_filters(&row, snapshot, window) {
            filtered += 1;
            continue;
        }
        records.push(CanonicalRecord { row });
    }

    if duplicates > 0 || excluded > 0 || filtered > 0 {
        debug!(
            event = "rows_aggregated",
            kept = records.len(),
            duplicates,
            excluded,
            filtered,
            "collapsed raw pages into canonical records"
        );
    }
    records
}

/// Establishes newest-first order for rows that did not come from a paged
/// fetch (preview samples). Fetched pages keep the source's order untouched.
pub fn order_rows_most_recent_first(rows: &mut [RemoteRow]) {
    rows.sort_by(|a, b| {
        b.observed_at
            .cmp(&a.observed_at)
            .then_with(|| b.entity_id.cmp(&a.entity_id))
    });
}

fn is_standing_excluded(row: &RemoteRow) -> bool {
    match &row.payload {
        RowPayload::CameraTrap { labels, .. } => {
            labels.iter().any(|label| is_blocked_term(label))
        }
        RowPayload::Occurrence {
            scientific_name, ..
        } => is_blocked_term(scientific_name),
    }
}

fn is_blocked_term(term: &str) -> bool {
    let trimmed = term.trim();
    STANDING_EXCLUSIONS
        .iter()
        .any(|blocked| trimmed.eq_ignore_ascii_case(blocked))
}

fn passes_snapshot_filters(
    row: &RemoteRow,
    snapshot: &FilterSnapshot,
    window: ResolvedWindow,
) -> bool {
    if !window.contains(row.observed_at) {
        return false;
    }
    if let Some(bbox) = snapshot.core.bbox {
        match (row.longitude, row.latitude) {
            (Some(lon), Some(lat)) if bbox.contains(lon, lat) => {}
            _ => return false,
        }
    }

    match &snapshot.custom {
        CustomFilters::CameraTrap {
            device_ids,
            labels,
            require_image,
        } => match &row.payload {
            RowPayload::CameraTrap {
                device_id,
                labels: row_labels,
                image_url,
            } => {
                if !device_ids.is_empty() && !device_ids.iter().any(|id| id == device_id) {
                    return false;
                }
                if !labels.is_empty()
                    && !labels.iter().any(|wanted| {
                        row_labels.iter().any(|label| label.eq_ignore_ascii_case(wanted))
                    })
                {
                    return false;
                }
                if *require_image && image_url.is_none() {
                    return false;
                }
                true
            }
            _ => false,
        },
        CustomFilters::Occurrence {
            taxon_ids,
            quality_grade,
            name_query,
            months,
        } => match &row.payload {
            RowPayload::Occurrence {
                taxon_id,
                scientific_name,
                common_name,
                quality_grade: row_grade,
            } => {
                if !taxon_ids.is_empty() {
                    match taxon_id {
                        Some(id) if taxon_ids.contains(id) => {}
                        _ => return false,
                    }
                }
                if let Some(wanted) = quality_grade {
                    match row_grade {
                        Some(grade) if grade.eq_ignore_ascii_case(wanted.as_param()) => {}
                        _ => return false,
                    }
                }
                if let Some(query) = name_query {
                    if !name_matches(query, scientific_name, common_name.as_deref()) {
                        return false;
                    }
                }
                if !months.is_empty() && !months.contains(&row.observed_at.month()) {
                    return false;
                }
                true
            }
            _ => false,
        },
        CustomFilters::Acoustic { .. } => true,
    }
}

fn name_matches(query: &str, scientific: &str, common: Option<&str>) -> bool {
    let needle = query.to_lowercase();
    if needle.trim().is_empty() {
        return true;
    }
    scientific.to_lowercase().contains(&needle)
        || common
            .map(|name| name.to_lowercase().contains(&needle))
            .unwrap_or(false)
}
