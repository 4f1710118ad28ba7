use super::super::types::{FilterClause, WorkingSet};
use crate::model::CanonicalRecord;

/// Disagreement between the committed estimate and the replayed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountMismatch {
    pub expected: u64,
    pub actual: u64,
}

/// Final, deliverable form of one export item.
#[derive(Debug)]
pub struct ReconciledExport {
    pub records: Vec<CanonicalRecord>,
    pub mismatch: Option<CountMismatch>,
    pub page_limit_exceeded: bool,
    pub relaxed: Option<FilterClause>,
}

/// Squares a working set with the snapshot's committed estimate.
///
/// The estimate is a promise made to the user at commit time: an export may
/// come up short, but it never delivers more records than the count the user
/// saw. Overage is trimmed from the tail, keeping the newest-first prefix
/// intact. Any disagreement between replayed and committed counts becomes an
/// annotation; reconciliation itself never fails.
pub fn reconcile(working: WorkingSet, estimated_count: u64) -> ReconciledExport {
    let WorkingSet {
        mut records,
        page_limit_exceeded,
        relaxed,
    } = working;

    let actual = records.len() as u64;
    let mismatch = if actual == estimated_count {
        None
    } else {
        if actual > estimated_count {
            records.truncate(usize::try_from(estimated_count).unwrap_or(usize::MAX));
        }
        Some(CountMismatch {
            expected: estimated_count,
            actual,
        })
    };

    ReconciledExport {
        records,
        mismatch,
        page_limit_exceeded,
        relaxed,
    }
}
