//! Durable local state: the badge credential and the favorites list.
//!
//! Both files are small JSON objects updated read-modify-write: the whole
//! object is read, one field is patched, and the whole object is written
//! back. Keys this crate does not know about are preserved.

mod auth;
mod favorites;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::warn;

pub use auth::{AuthStore, Credential, mask_token};
pub use favorites::{FavoritesList, FavoritesStore};

/// Reads a JSON object from disk.
///
/// A missing file is an empty object. A file that is not a JSON object is
/// logged and treated as empty so the next write replaces it.
fn read_object(path: &Path) -> Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) | Err(_) => {
            warn!(path = %path.display(), "ignoring malformed JSON store");
            Ok(Map::new())
        }
    }
}

/// Writes a JSON object, creating parent directories as needed.
///
/// `private` restricts permissions to the owner (0600) on unix.
fn write_object(path: &Path, object: &Map<String, Value>, private: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let contents = serde_json::to_string_pretty(object)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;

    #[cfg(unix)]
    if private {
        use std::fs::OpenOptions;
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("Failed to open {} for writing", path.display()))?;
        file.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write to {}", path.display()))?;
        return Ok(());
    }

    #[cfg(not(unix))]
    let _ = private;

    fs::write(path, contents).with_context(|| format!("Failed to write to {}", path.display()))
}
