//! Process-wide state shared by every component.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::api::ApiClient;
use crate::config::{Config, paths};
use crate::connectivity::{Connectivity, Gate};
use crate::store::{AuthStore, FavoritesStore};

/// Configuration, API client, connectivity source and local stores.
///
/// Built once at startup and shared as `Arc<Session>`.
pub struct Session {
    pub config: Config,
    pub api: ApiClient,
    pub auth: AuthStore,
    pub favorites: FavoritesStore,
    home: PathBuf,
    connectivity: Arc<dyn Connectivity>,
}

impl Session {
    /// Opens the stores under `home` and builds the API client.
    ///
    /// # Errors
    /// Returns an error if the configured base URL is invalid.
    pub fn open(config: Config, home: &Path, connectivity: Arc<dyn Connectivity>) -> Result<Self> {
        let api = ApiClient::new(&config.base_url, config.image_fallback)?;
        Ok(Self {
            auth: AuthStore::open(home.join(paths::AUTH_FILE)),
            favorites: FavoritesStore::new(home.join(paths::FAVORITES_FILE)),
            api,
            config,
            home: home.to_path_buf(),
            connectivity,
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn is_logged_in(&self) -> bool {
        self.auth.is_logged_in()
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity.is_connected()
    }

    /// Connectivity gate using the configured poll interval.
    pub fn gate(&self) -> Gate<'_> {
        Gate {
            connectivity: self.connectivity.as_ref(),
            poll: self.config.timing.connectivity_poll(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.config.base_url)
            .field("home", &self.home)
            .field("logged_in", &self.is_logged_in())
            .finish_non_exhaustive()
    }
}
