//! Sequential thumbnail prefetch.
//!
//! One task per index. A step downloads thumbnail `i`, stores it, then
//! spawns the step for `i + 1`. The page identity is checked before the
//! request, before the write and before scheduling the next step.

use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Gallery, PageIdentity};
use crate::error::RetryError;
use crate::packed::PackedImage;
use crate::retry::with_retries;

impl Gallery {
    pub(super) fn spawn_thumbnail(&self, identity: PageIdentity, index: usize) -> JoinHandle<()> {
        tokio::spawn(self.clone().download_thumbnail(identity, index))
    }

    async fn download_thumbnail(self, identity: PageIdentity, index: usize) {
        let Some(sequence_id) = self.sequence_id_at(identity, index) else {
            return;
        };
        let session = Arc::clone(&self.session);
        let api = &session.api;
        let auth = &session.auth;
        let id = sequence_id.as_str();

        let result = with_retries(
            "download thumbnail",
            session.config.retry.thumbnail(),
            session.gate(),
            || self.is_current(identity),
            move |_| async move { api.thumbnail(id, &auth.headers()).await },
        )
        .await;

        match result {
            Ok(bytes) => {
                if !self.store_thumbnail(identity, index, &sequence_id, bytes) {
                    return;
                }
            }
            Err(RetryError::Stale) => {
                debug!(index, "thumbnail chain abandoned");
                return;
            }
            Err(err @ RetryError::Exhausted { .. }) => {
                warn!(id = %sequence_id, error = %err, "failed to download thumbnail");
            }
        }

        let has_next = {
            let state = self.lock();
            state.identity(session.is_logged_in()) == identity && index + 1 < state.sequences.len()
        };
        if has_next {
            self.spawn_thumbnail(identity, index + 1);
        } else {
            debug!(page = identity.page, "thumbnail chain finished");
        }
    }

    fn sequence_id_at(&self, identity: PageIdentity, index: usize) -> Option<String> {
        let state = self.lock();
        if state.identity(self.session.is_logged_in()) != identity {
            return None;
        }
        state.sequences.get(index).map(|s| s.id.clone())
    }

    /// Writes the thumbnail if the page is still current. Returns whether
    /// it was.
    fn store_thumbnail(
        &self,
        identity: PageIdentity,
        index: usize,
        sequence_id: &str,
        bytes: Bytes,
    ) -> bool {
        let mut state = self.lock();
        if state.identity(self.session.is_logged_in()) != identity {
            return false;
        }
        let image = PackedImage::new(bytes);
        if image.is_none() {
            warn!(id = sequence_id, "thumbnail payload is truncated");
        }
        if let Some(sequence) = state
            .sequences
            .get_mut(index)
            .filter(|s| s.id == sequence_id)
        {
            debug!(id = sequence_id, index, "stored thumbnail");
            sequence.thumbnail = image;
        }
        true
    }
}
