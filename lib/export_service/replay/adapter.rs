use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use super::super::error::PageFetchError;
use super::super::types::{clause_params, FetchPlan, FilterClause, PageRequest, SizingPolicy};
use crate::model::{FilterSnapshot, RemoteRow, SourceKind};

/// Replays snapshot queries against one remote source.
///
/// `build_plan` is pure; `fetch_page` does the network work. Implementations
/// own their rate limiter, so every page request, including relaxed retries,
/// draws from one budget.
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> SourceKind;

    /// Derives push-down clauses and the fetch budget for `snapshot`, with
    /// relative windows anchored at `now`.
    fn build_plan(
        &self,
        snapshot: &FilterSnapshot,
        now: DateTime<Utc>,
        sizing: &SizingPolicy,
    ) -> FetchPlan;

    fn fetch_page<'a>(
        &'a self,
        clauses: &'a [FilterClause],
        request: PageRequest,
    ) -> BoxFuture<'a, Result<Vec<RemoteRow>, PageFetchError>>;

    /// How many page requests may be in flight at once after the first page.
    fn fan_out(&self) -> usize {
        1
    }
}

impl<T> SourceAdapter for Arc<T>
where
    T: SourceAdapter + ?Sized,
{
    fn source(&self) -> SourceKind {
        (**self).source()
    }

    fn build_plan(
        &self,
        snapshot: &FilterSnapshot,
        now: DateTime<Utc>,
        sizing: &SizingPolicy,
    ) -> FetchPlan {
        (**self).build_plan(snapshot, now, sizing)
    }

    fn fetch_page<'a>(
        &'a self,
        clauses: &'a [FilterClause],
        request: PageRequest,
    ) -> BoxFuture<'a, Result<Vec<RemoteRow>, PageFetchError>> {
        (**self).fetch_page(clauses, request)
    }

    fn fan_out(&self) -> usize {
        (**self).fan_out()
    }
}

/// Full query-parameter set for one page: predicate clauses plus paging.
/// Ordering is pinned to newest-first so paging offsets stay stable while
/// new data arrives behind the cursor.
pub fn page_params(clauses: &[FilterClause], request: PageRequest) -> Vec<(String, String)> {
    let mut params = clause_params(clauses);
    params.push(("order".to_string(), "desc".to_string()));
    params.push(("offset".to_string(), request.offset.to_string()));
    params.push(("limit".to_string(), request.limit.to_string()));
    params
}

/// Maps source kinds to their adapters. A missing entry means the source
/// cannot be exported yet and fails fast per item.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<SourceKind, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.source(), adapter);
    }

    pub fn get(&self, source: SourceKind) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.get(&source)
    }
}
