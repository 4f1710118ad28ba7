mod store;

pub use store::CartStore;

use crate::model::FilterSnapshot;
use thiserror::Error;

/// Hard cap on saved queries. Reaching it is an error, never an eviction:
/// the user decides what leaves the cart.
pub const DEFAULT_CART_CAPACITY: usize = 50;

#[derive(Error, Debug)]
pub enum CartError {
    #[error("cart is full ({capacity} saved queries); remove one before adding more")]
    CapacityExceeded { capacity: usize },
    #[error("no saved query matches id `{0}`")]
    UnknownSnapshot(String),
    #[error("id `{0}` matches more than one saved query; use a longer prefix")]
    AmbiguousSnapshot(String),
    #[error("could not locate a platform data directory for the cart file")]
    NoDataDir,
    #[error("cart file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("cart file encoding: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Aggregate numbers shown in `cart list` footers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub entries: usize,
    pub estimated_records: u64,
}

/// Ordered collection of committed snapshots, most recent first.
///
/// The queue is bounded and append-only at the front; snapshots themselves are
/// immutable, so mutation is limited to adds and removals.
#[derive(Debug, Clone, PartialEq)]
pub struct CartQueue {
    capacity: usize,
    snapshots: Vec<FilterSnapshot>,
}

impl Default for CartQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CART_CAPACITY)
    }
}

impl CartQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            snapshots: Vec::new(),
        }
    }

    /// Rebuilds a queue from persisted snapshots. Anything beyond `capacity`
    /// is dropped from the old end, since the slice is most-recent-first.
    pub fn from_snapshots(capacity: usize, mut snapshots: Vec<FilterSnapshot>) -> Self {
        snapshots.truncate(capacity);
        Self {
            capacity,
            snapshots,
        }
    }

    pub fn append(&mut self, snapshot: FilterSnapshot) -> Result<(), CartError> {
        if self.snapshots.len() >= self.capacity {
            return Err(CartError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.snapshots.insert(0, snapshot);
        Ok(())
    }

    /// Removes the snapshot whose id matches `needle` exactly, or whose id
    /// starts with `needle` when that prefix is unambiguous.
    pub fn remove(&mut self, needle: &str) -> Result<FilterSnapshot, CartError> {
        let index = self.position_of(needle)?;
        Ok(self.snapshots.remove(index))
    }

    pub fn find(&self, needle: &str) -> Result<&FilterSnapshot, CartError> {
        let index = self.position_of(needle)?;
        Ok(&self.snapshots[index])
    }

    fn position_of(&self, needle: &str) -> Result<usize, CartError> {
        if let Some(index) = self.snapshots.iter().position(|s| s.id == needle) {
            return Ok(index);
        }
        let mut matches = self
            .snapshots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.id.starts_with(needle));
        match (matches.next(), matches.next()) {
            (Some((index, _)), None) => Ok(index),
            (Some(_), Some(_)) => Err(CartError::AmbiguousSnapshot(needle.to_string())),
            (None, _) => Err(CartError::UnknownSnapshot(needle.to_string())),
        }
    }

    /// Empties the cart and returns how many snapshots were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.snapshots.len();
        self.snapshots.clear();
        removed
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals {
            entries: self.snapshots.len(),
            estimated_records: self
                .snapshots
                .iter()
                .fold(0u64, |acc, s| acc.saturating_add(s.estimated_count)),
        }
    }

    pub fn snapshots(&self) -> &[FilterSnapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
