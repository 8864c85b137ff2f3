//! Optimistic favorite toggling with an offline-first local list.
//!
//! The in-memory flag flips at once. Unfavoriting writes the local list
//! before any request; every failed sync attempt writes it again, so the
//! local list always converges on the latest toggle. A newer toggle of the
//! same sequence supersedes an older sync still retrying.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::RetryError;
use crate::retry::with_retries;
use crate::sequence::Sequence;
use crate::session::Session;

#[derive(Debug, Default)]
struct FavoriteState {
    sequence: Option<Sequence>,
    is_favorited: bool,
    next_generation: u64,
    /// Toggle per sequence id whose sync has not settled yet.
    latest: HashMap<String, u64>,
    /// Favorite state the server accepted, per sequence id. Outranks the
    /// flag on copies of a sequence fetched before the sync.
    confirmed: HashMap<String, bool>,
}

/// Favorite manager handle. Clones share state.
#[derive(Debug, Clone)]
pub struct FavoriteManager {
    session: Arc<Session>,
    state: Arc<Mutex<FavoriteState>>,
}

impl FavoriteManager {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            state: Arc::new(Mutex::new(FavoriteState::default())),
        }
    }

    /// Shows `sequence`. A state confirmed by an earlier sync wins;
    /// otherwise it counts as favorited if the server says so or the local
    /// list has it.
    pub fn set_sequence(&self, mut sequence: Sequence) {
        let local = self.is_local_favorite(&sequence.id);
        let mut state = self.lock();
        if let Some(&confirmed) = state.confirmed.get(&sequence.id) {
            sequence.favorited_by_current_user = confirmed;
        }
        state.is_favorited = sequence.favorited_by_current_user || local;
        state.sequence = Some(sequence);
    }

    pub fn sequence(&self) -> Option<Sequence> {
        self.lock().sequence.clone()
    }

    pub fn is_favorited(&self) -> bool {
        self.lock().is_favorited
    }

    /// Whether a sync for `id` is still running.
    pub fn is_syncing(&self, id: &str) -> bool {
        self.lock().latest.contains_key(id)
    }

    /// Offline favorite check against the durable list.
    pub fn is_local_favorite(&self, id: &str) -> bool {
        self.session.favorites.contains(id)
    }

    /// Flips the shown sequence's favorite state and syncs it.
    pub fn toggle(&self) -> Option<JoinHandle<()>> {
        let (id, favorited) = {
            let mut state = self.lock();
            let id = state.sequence.as_ref()?.id.clone();
            state.is_favorited = !state.is_favorited;
            (id, state.is_favorited)
        };
        Some(self.set(&id, favorited))
    }

    /// Records `favorited` for `id` and syncs it with the server.
    pub fn set(&self, id: &str, favorited: bool) -> JoinHandle<()> {
        let generation = {
            let mut state = self.lock();
            state.next_generation += 1;
            let generation = state.next_generation;
            state.latest.insert(id.to_string(), generation);
            if let Some(sequence) = state.sequence.as_ref().filter(|s| s.id == id) {
                debug!(id = %sequence.id, favorited, "toggled favorite");
                state.is_favorited = favorited;
            }
            if !favorited {
                self.write_local(id, false);
            }
            generation
        };
        info!(id, favorited, "setting favorite");
        tokio::spawn(self.clone().sync(id.to_string(), favorited, generation))
    }

    async fn sync(self, id: String, favorited: bool, generation: u64) {
        let session = Arc::clone(&self.session);
        let api = &session.api;
        let auth = &session.auth;
        let id_ref = id.as_str();
        let this = &self;

        let result = with_retries(
            "sync favorite",
            session.config.retry.favorite(),
            session.gate(),
            || self.is_latest(id_ref, generation),
            move |_| async move {
                let outcome = api.set_favorite(id_ref, favorited, &auth.headers()).await;
                if outcome.is_err() {
                    this.record_failure(id_ref, favorited, generation);
                }
                outcome
            },
        )
        .await;

        match result {
            Ok(()) => {
                let mut state = self.lock();
                if state.latest.get(&id) != Some(&generation) {
                    debug!(id, "favorite sync superseded after response");
                    return;
                }
                state.latest.remove(&id);
                state.confirmed.insert(id.clone(), favorited);
                if let Some(sequence) = state.sequence.as_mut().filter(|s| s.id == id) {
                    sequence.favorited_by_current_user = favorited;
                }
                info!(id, favorited, "favorite synced");
            }
            Err(RetryError::Stale) => debug!(id, "favorite sync superseded"),
            Err(err @ RetryError::Exhausted { .. }) => {
                self.settle(&id, generation);
                warn!(id, error = %err, "favorite kept locally only");
            }
        }
    }

    /// Forgets the pending toggle for `id` unless a newer one replaced it.
    fn settle(&self, id: &str, generation: u64) {
        let mut state = self.lock();
        if state.latest.get(id) == Some(&generation) {
            state.latest.remove(id);
        }
    }

    fn is_latest(&self, id: &str, generation: u64) -> bool {
        self.lock().latest.get(id) == Some(&generation)
    }

    /// Writes the local list for a failed attempt, unless a newer toggle
    /// exists. Runs under the state lock so it cannot interleave with one.
    fn record_failure(&self, id: &str, favorited: bool, generation: u64) {
        let state = self.lock();
        if state.latest.get(id) == Some(&generation) {
            self.write_local(id, favorited);
        }
    }

    fn write_local(&self, id: &str, favorited: bool) {
        if let Err(err) = self.session.favorites.set(id, favorited) {
            warn!(id, error = %err, "failed to save favorite locally");
        }
    }

    fn lock(&self) -> MutexGuard<'_, FavoriteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
