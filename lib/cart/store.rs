use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CartError, CartQueue, DEFAULT_CART_CAPACITY};
use crate::model::FilterSnapshot;

#[derive(Debug, Serialize, Deserialize)]
struct CartBlob {
    #[serde(default)]
    snapshots: Vec<FilterSnapshot>,
}

/// File-backed persistence for the cart.
///
/// Loading fails open: a missing, unreadable, or corrupt blob yields an empty
/// cart with a warning, so a damaged file never blocks new work. Writers use
/// write-then-rename, and concurrent writers are last-write-wins; there is no
/// cross-process lock.
pub struct CartStore {
    path: PathBuf,
}

impl CartStore {
    /// Places the cart under the platform data directory
    /// (for example `~/.local/share/fieldcart/cart.json`).
    pub fn at_default_location() -> Result<Self, CartError> {
        let base = dirs::data_dir().ok_or(CartError::NoDataDir)?;
        Ok(Self {
            path: base.join("fieldcart").join("cart.json"),
        })
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> CartQueue {
        self.load_with_capacity(DEFAULT_CART_CAPACITY)
    }

    pub fn load_with_capacity(&self, capacity: usize) -> CartQueue {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(
                    event = "cart_file_absent",
                    path = %self.path.display(),
                    "no cart file yet; starting empty"
                );
                return CartQueue::with_capacity(capacity);
            }
            Err(err) => {
                warn!(
                    event = "cart_file_unreadable",
                    path = %self.path.display(),
                    error = %err,
                    "could not read cart file; starting with an empty cart"
                );
                return CartQueue::with_capacity(capacity);
            }
        };

        match serde_json::from_str::<CartBlob>(&raw) {
            Ok(blob) => CartQueue::from_snapshots(capacity, blob.snapshots),
            Err(err) => {
                warn!(
                    event = "cart_file_corrupt",
                    path = %self.path.display(),
                    error = %err,
                    "cart file is corrupt; starting with an empty cart"
                );
                CartQueue::with_capacity(capacity)
            }
        }
    }

    pub fn save(&self, cart: &CartQueue) -> Result<(), CartError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let blob = CartBlob {
            snapshots: cart.snapshots().to_vec(),
        };
        let encoded = serde_json::to_string_pretty(&blob)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded)?;
        fs::rename(&staging, &self.path)?;
        debug!(
            event = "cart_file_saved",
            path = %self.path.display(),
            entries = cart.len(),
            "persisted cart"
        );
        Ok(())
    }
}
