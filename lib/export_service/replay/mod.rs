mod adapter;
mod aggregator;
mod camera_trap;
mod error_mapping;
mod fallback;
mod occurrence;
mod paginator;
mod reconcile;

pub use adapter::{page_params, AdapterRegistry, SourceAdapter};
pub use aggregator::{aggregate, order_rows_most_recent_first};
pub use camera_trap::{camera_clauses, camera_is_narrow, CameraTrapAdapter};
pub use fallback::{PredicateAttempt, RelaxError};
pub use occurrence::{
    occurrence_clauses, occurrence_is_narrow, OccurrenceAdapter, DEFAULT_OCCURRENCE_FAN_OUT,
};
pub use paginator::{fetch_all, FetchHalt, PagedFetch};
pub use reconcile::{reconcile, CountMismatch, ReconciledExport};

pub(crate) use camera_trap::media_to_remote;
pub(crate) use occurrence::occurrence_to_remote;

#[cfg(test)]
pub(crate) mod test_support;
