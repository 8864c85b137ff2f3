//! Badge credential storage.
//!
//! Stores `auth_token` and `badge_uuid` in `<home>/auth_token.json` with
//! restricted permissions (0600). Tokens are never logged in full.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use serde_json::Value;
use tracing::{info, warn};

use super::{read_object, write_object};
use crate::api::AuthHeaders;

const AUTH_TOKEN_KEY: &str = "auth_token";
const BADGE_UUID_KEY: &str = "badge_uuid";

/// Credential as held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub auth_token: Option<String>,
    pub badge_uuid: Option<String>,
}

impl Credential {
    /// Logged in means a non-empty token.
    pub fn is_logged_in(&self) -> bool {
        self.auth_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn has_badge_uuid(&self) -> bool {
        self.badge_uuid.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn headers(&self) -> AuthHeaders {
        AuthHeaders::new(self.auth_token.clone(), self.badge_uuid.clone())
    }
}

/// Process-wide credential, loaded once and written through on change.
#[derive(Debug)]
pub struct AuthStore {
    path: PathBuf,
    current: Mutex<Credential>,
}

impl AuthStore {
    /// Loads the credential file. Read failures are logged and start the
    /// session logged out.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match read_object(&path) {
            Ok(object) => Credential {
                auth_token: string_field(&object, AUTH_TOKEN_KEY),
                badge_uuid: string_field(&object, BADGE_UUID_KEY),
            },
            Err(err) => {
                warn!(error = %err, "failed to load credential");
                Credential::default()
            }
        };
        info!(
            logged_in = current.is_logged_in(),
            token = %current.auth_token.as_deref().map(mask_token).unwrap_or_default(),
            "loaded credential"
        );
        Self {
            path,
            current: Mutex::new(current),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn credential(&self) -> Credential {
        self.lock().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().is_logged_in()
    }

    pub fn headers(&self) -> AuthHeaders {
        self.lock().headers()
    }

    pub fn badge_uuid(&self) -> Option<String> {
        self.lock().badge_uuid.clone()
    }

    /// Records a server-assigned badge identity and persists it.
    ///
    /// # Errors
    /// Returns an error if the credential file cannot be written.
    pub fn set_badge_uuid(&self, badge_uuid: &str) -> Result<()> {
        self.lock().badge_uuid = Some(badge_uuid.to_string());
        self.persist(None, Some(badge_uuid))
    }

    /// Adopts `badge_uuid` only if no identity is stored yet.
    ///
    /// Returns whether the identity was adopted.
    ///
    /// # Errors
    /// Returns an error if the credential file cannot be written.
    pub fn adopt_badge_uuid(&self, badge_uuid: &str) -> Result<bool> {
        if badge_uuid.is_empty() {
            return Ok(false);
        }
        {
            let mut current = self.lock();
            if current.has_badge_uuid() {
                return Ok(false);
            }
            current.badge_uuid = Some(badge_uuid.to_string());
        }
        self.persist(None, Some(badge_uuid))?;
        Ok(true)
    }

    /// Stores a freshly issued token (and identity, when the server sent one).
    ///
    /// # Errors
    /// Returns an error if the credential file cannot be written.
    pub fn log_in(&self, auth_token: &str, badge_uuid: Option<&str>) -> Result<()> {
        {
            let mut current = self.lock();
            current.auth_token = Some(auth_token.to_string());
            if let Some(uuid) = badge_uuid.filter(|u| !u.is_empty()) {
                current.badge_uuid = Some(uuid.to_string());
            }
        }
        let badge_uuid = self.badge_uuid();
        self.persist(Some(auth_token), badge_uuid.as_deref())
    }

    /// Clears the token in memory and on disk. Returns the previous token.
    ///
    /// The in-memory credential is cleared even if the write fails.
    ///
    /// # Errors
    /// Returns an error if the credential file cannot be written.
    pub fn log_out(&self) -> Result<Option<String>> {
        let previous = self.lock().auth_token.take();
        self.persist(Some(""), None)?;
        Ok(previous.filter(|t| !t.is_empty()))
    }

    fn persist(&self, auth_token: Option<&str>, badge_uuid: Option<&str>) -> Result<()> {
        let mut object = read_object(&self.path)?;
        if let Some(token) = auth_token {
            object.insert(AUTH_TOKEN_KEY.to_string(), Value::from(token));
        }
        if let Some(uuid) = badge_uuid {
            object.insert(BADGE_UUID_KEY.to_string(), Value::from(uuid));
        }
        write_object(&self.path, &object, true)
    }

    fn lock(&self) -> MutexGuard<'_, Credential> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn string_field(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Returns a masked version of a token for display (first 6 chars + ...).
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 10 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}...")
}
