use thiserror::Error;

use super::super::types::FilterClause;

/// Why a rejection could not be absorbed by relaxation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RelaxError {
    #[error("rejected parameter `{0}` does not belong to any push-down clause")]
    UnknownFilter(String),
    #[error("predicate was already relaxed once for this fetch")]
    AlreadyRelaxed,
}

/// Predicate negotiation state for one fetch.
///
/// There are exactly two states and one legal transition. `Attempting` may
/// absorb a single first-page rejection by dropping the clause that owns the
/// rejected parameter; after that the clause set is settled for the rest of
/// the fetch. The dropped clause is re-applied client-side during aggregation
/// and is never sent to the source again within the same fetch, so the loop
/// cannot oscillate between full and relaxed predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateAttempt {
    Attempting { clauses: Vec<FilterClause> },
    Relaxed {
        clauses: Vec<FilterClause>,
        dropped: FilterClause,
    },
}

impl PredicateAttempt {
    pub fn new(clauses: Vec<FilterClause>) -> Self {
        Self::Attempting { clauses }
    }

    /// The clause set to push down right now.
    pub fn clauses(&self) -> &[FilterClause] {
        match self {
            Self::Attempting { clauses } | Self::Relaxed { clauses, .. } => clauses,
        }
    }

    pub fn dropped(&self) -> Option<&FilterClause> {
        match self {
            Self::Attempting { .. } => None,
            Self::Relaxed { dropped, .. } => Some(dropped),
        }
    }

    /// Absorbs a first-page rejection of `filter` by dropping the owning
    /// clause. Fails when no clause owns the parameter or when a clause was
    /// already dropped.
    pub fn on_rejection(self, filter: &str) -> Result<Self, RelaxError> {
        match self {
            Self::Attempting { mut clauses } => {
                let index = match clauses.iter().position(|clause| clause.owns_param(filter)) {
                    Some(index) => index,
                    None => return Err(RelaxError::UnknownFilter(filter.to_string())),
                };
                let dropped = clauses.remove(index);
                Ok(Self::Relaxed { clauses, dropped })
            }
            Self::Relaxed { .. } => Err(RelaxError::AlreadyRelaxed),
        }
    }

    pub fn into_dropped(self) -> Option<FilterClause> {
        match self {
            Self::Attempting { .. } => None,
            Self::Relaxed { dropped, .. } => Some(dropped),
        }
    }
}
