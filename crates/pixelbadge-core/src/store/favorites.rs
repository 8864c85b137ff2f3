//! Local favorites list (`<home>/favorite_animations.json`).
//!
//! This list is the offline source of truth for favorite state. Writes are
//! idempotent so failed network syncs can repeat them freely.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{read_object, write_object};

const LIST_KEY: &str = "list";

/// Favorite sequence ids, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritesList {
    #[serde(default)]
    pub list: Vec<String>,
}

impl FavoritesList {
    pub fn contains(&self, id: &str) -> bool {
        self.list.iter().any(|item| item == id)
    }

    /// Adds or removes `id`. Returns whether the list changed.
    pub fn set(&mut self, id: &str, favorited: bool) -> bool {
        match (favorited, self.contains(id)) {
            (true, false) => {
                self.list.push(id.to_string());
                true
            }
            (false, true) => {
                self.list.retain(|item| item != id);
                true
            }
            _ => false,
        }
    }
}

/// File-backed favorites list.
///
/// Read-modify-write cycles are serialized so concurrent toggles cannot
/// interleave their reads and writes.
#[derive(Debug)]
pub struct FavoritesStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FavoritesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the list; any failure yields an empty list.
    pub fn load(&self) -> FavoritesList {
        match self.try_load() {
            Ok(list) => list,
            Err(err) => {
                warn!(error = %err, "failed to load favorites");
                FavoritesList::default()
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.load().contains(id)
    }

    /// Durably records the favorite state of `id`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn set(&self, id: &str, favorited: bool) -> Result<FavoritesList> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut object = read_object(&self.path)?;
        let mut favorites: FavoritesList = object
            .get(LIST_KEY)
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .map(|list| FavoritesList { list })
            .unwrap_or_default();

        if favorites.set(id, favorited) {
            debug!(id, favorited, "updated local favorites");
        }
        object.insert(
            LIST_KEY.to_string(),
            serde_json::to_value(&favorites.list).context("Failed to serialize favorites")?,
        );
        write_object(&self.path, &object, false)?;
        Ok(favorites)
    }

    fn try_load(&self) -> Result<FavoritesList> {
        let object = read_object(&self.path)?;
        match object.get(LIST_KEY) {
            Some(value) => serde_json::from_value(value.clone())
                .map(|list| FavoritesList { list })
                .with_context(|| format!("Malformed favorites list in {}", self.path.display())),
            None => Ok(FavoritesList::default()),
        }
    }
}
