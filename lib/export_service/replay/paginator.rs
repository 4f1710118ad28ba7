use futures_util::stream::{self, StreamExt};
use tracing::{debug, warn};

use super::super::error::{ExportError, PageFetchError};
use super::super::generation::GenerationGate;
use super::super::types::{FetchPlan, FilterClause, PageRequest, PagingPolicy};
use super::adapter::SourceAdapter;
use super::fallback::{PredicateAttempt, RelaxError};

/// Why a fetch stopped without producing rows.
#[derive(Debug)]
pub enum FetchHalt {
    /// The run was superseded mid-fetch; drop everything silently.
    Stale,
    Failed(ExportError),
}

/// Raw result of replaying one plan.
#[derive(Debug)]
pub struct PagedFetch {
    pub rows: Vec<crate::model::RemoteRow>,
    pub pages_fetched: u32,
    /// True when the circuit breaker stopped the fetch while the source
    /// likely still had rows.
    pub page_limit_exceeded: bool,
    /// The clause dropped by predicate relaxation, when one was.
    pub relaxed: Option<FilterClause>,
}

/// Pages through one plan until the data ends, the budget is reached, or the
/// circuit breaker trips.
///
/// The first page always runs alone: it is the only request that may absorb a
/// predicate rejection, and its outcome settles the clause set before any
/// concurrent pages launch. Every page limit is clipped to the remaining
/// budget, so a full page always means "exactly what was asked for" and a
/// short page unambiguously means the data ended.
///
/// `generation` is checked after every page arrival. A stale result aborts
/// the fetch without cancelling requests that are already in flight; those
/// drain and their rows are dropped with the stream.
pub async fn fetch_all(
    adapter: &dyn SourceAdapter,
    plan: &FetchPlan,
    paging: &PagingPolicy,
    gate: &GenerationGate,
    generation: u64,
) -> Result<PagedFetch, FetchHalt> {
    if plan.max_records == 0 {
        return Ok(PagedFetch {
            rows: Vec::new(),
            pages_fetched: 0,
            page_limit_exceeded: false,
            relaxed: None,
        });
    }

    let page_size = paging.page_size.max(1);
    let mut state = PredicateAttempt::new(plan.clauses.clone());
    let first_limit = page_limit(page_size, plan.max_records, 0);

    let mut rows = loop {
        let request = PageRequest {
            offset: 0,
            limit: first_limit,
        };
        let outcome = adapter.fetch_page(state.clauses(), request).await;
        if !gate.is_current(generation) {
            return Err(FetchHalt::Stale);
        }
        match outcome {
            Ok(page_rows) => break page_rows,
            Err(PageFetchError::PredicateRejected { filter }) => {
                state = match state.on_rejection(&filter) {
                    Ok(next) => {
                        warn!(
                            event = "predicate_relaxed",
                            source = ?plan.source,
                            filter = %filter,
                            "source rejected a filter; dropping it from the query and applying it client-side"
                        );
                        next
                    }
                    Err(reason) => {
                        return Err(FetchHalt::Failed(ExportError::Query(relaxation_failure(
                            &filter, &reason,
                        ))))
                    }
                };
            }
            Err(other) => return Err(FetchHalt::Failed(page_failure(other, &state))),
        }
    };

    debug!(
        event = "first_page_fetched",
        source = ?plan.source,
        rows = rows.len(),
        budget = plan.max_records,
        "first page settled the predicate"
    );

    // A short or budget-filling first page answers the whole fetch.
    if rows.len() < first_limit as usize || u64::from(first_limit) >= plan.max_records {
        return Ok(PagedFetch {
            rows,
            pages_fetched: 1,
            page_limit_exceeded: false,
            relaxed: state.into_dropped(),
        });
    }

    let stride = u64::from(page_size);
    let pages_needed =
        plan.max_records / stride + u64::from(plan.max_records % stride != 0);
    let pages_allowed = u64::from(paging.max_pages).min(pages_needed);
    let truncated = pages_allowed < pages_needed;

    let requests: Vec<PageRequest> = (1..pages_allowed)
        .map(|index| {
            let offset = index * stride;
            PageRequest {
                offset,
                limit: page_limit(page_size, plan.max_records, offset),
            }
        })
        .collect();

    let clauses: &[FilterClause] = state.clauses();
    let fan_out = adapter.fan_out().max(1);
    let mut pages = stream::iter(requests.into_iter().map(move |request| async move {
        (request, adapter.fetch_page(clauses, request).await)
    }))
    .buffered(fan_out);

    let mut pages_fetched: u32 = 1;
    let mut saw_short_page = false;
    while let Some((request, outcome)) = pages.next().await {
        if !gate.is_current(generation) {
            return Err(FetchHalt::Stale);
        }
        match outcome {
            Ok(page_rows) => {
                pages_fetched += 1;
                let short = page_rows.len() < request.limit as usize;
                rows.extend(page_rows);
                if short {
                    saw_short_page = true;
                    break;
                }
            }
            Err(err) => return Err(FetchHalt::Failed(page_failure(err, &state))),
        }
    }
    drop(pages);

    let page_limit_exceeded = truncated && !saw_short_page;
    if page_limit_exceeded {
        warn!(
            event = "page_limit_reached",
            source = ?plan.source,
            pages = pages_fetched,
            rows = rows.len(),
            "stopped at the page circuit breaker; export will be partial"
        );
    }

    Ok(PagedFetch {
        rows,
        pages_fetched,
        page_limit_exceeded,
        relaxed: state.into_dropped(),
    })
}

/// Limit for the page at `offset`: full pages except the last, which asks
/// for exactly the remaining budget.
fn page_limit(page_size: u32, max_records: u64, offset: u64) -> u32 {
    let remaining = max_records.saturating_sub(offset);
    u64::from(page_size).min(remaining) as u32
}

fn relaxation_failure(filter: &str, reason: &RelaxError) -> String {
    format!("source rejected `{filter}` and the query could not be relaxed: {reason}")
}

/// Maps a page-level failure to the item-level class. After relaxation the
/// query is no longer the one the user committed, so any failure reads as a
/// query problem rather than a transport problem.
fn page_failure(err: PageFetchError, state: &PredicateAttempt) -> ExportError {
    match err {
        PageFetchError::PredicateRejected { filter } => ExportError::Query(format!(
            "source rejected `{filter}` after the predicate was settled"
        )),
        PageFetchError::Network(message) => {
            if state.dropped().is_some() {
                ExportError::Query(format!("relaxed query failed to replay: {message}"))
            } else {
                ExportError::Network(message)
            }
        }
        PageFetchError::Malformed(message) => {
            ExportError::Query(format!("source returned an unusable page: {message}"))
        }
    }
}
