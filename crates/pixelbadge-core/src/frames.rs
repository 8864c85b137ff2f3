//! Frame download and playback of one sequence.
//!
//! Frames land in a per-sequence cache of `Option<Bytes>` slots. Playback
//! starts as soon as frame 0 arrives: the frame shown is the last cached
//! one at or before the playback cursor.
//!
//! Two transfer modes:
//! - fastload: one request returns every frame back to back
//! - legacy: one request per frame, chained in index order
//!
//! Each download step runs in its own task and re-checks the
//! [`PlaybackIdentity`] after every suspension point.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::RetryError;
use crate::packed::{PackedImage, decode_fastload};
use crate::retry::with_retries;
use crate::sequence::Sequence;
use crate::session::Session;

/// Identity of one playback session of one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackIdentity {
    sequence_id: String,
    generation: u64,
}

/// Download progress for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub downloaded: usize,
    pub total: usize,
    /// Waiting for connectivity rather than failing.
    pub blocked: bool,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.downloaded >= self.total
    }
}

/// A renderable frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub index: usize,
    pub data: Bytes,
}

impl Frame {
    /// Parses the frame as a packed image (image fallback mode only).
    pub fn packed(&self) -> Option<PackedImage> {
        PackedImage::new(self.data.clone())
    }
}

#[derive(Debug)]
struct Playback {
    sequence: Sequence,
    generation: u64,
    cache: Vec<Option<Bytes>>,
    downloaded: usize,
    downloading: bool,
    /// Fastload delivers everything it will ever deliver in one response.
    fastload_done: bool,
    cursor: usize,
    timer_ms: u64,
    frame_time_ms: u64,
}

impl Playback {
    fn identity(&self) -> PlaybackIdentity {
        PlaybackIdentity {
            sequence_id: self.sequence.id.clone(),
            generation: self.generation,
        }
    }

    fn matches(&self, identity: &PlaybackIdentity) -> bool {
        self.generation == identity.generation && self.sequence.id == identity.sequence_id
    }

    /// Index of the next unit of work, if any.
    fn next_unit(&self, fastload: bool) -> Option<usize> {
        if fastload {
            (!self.fastload_done && !self.cache.is_empty()).then_some(0)
        } else {
            self.cache.iter().position(Option::is_none)
        }
    }

    fn current_frame(&self) -> Option<Frame> {
        if self.cache.is_empty() {
            return None;
        }
        let cursor = self.cursor % self.cache.len();
        (0..=cursor).rev().find_map(|index| {
            self.cache[index].as_ref().map(|data| Frame {
                index,
                data: data.clone(),
            })
        })
    }

    fn release(&mut self) {
        for slot in &mut self.cache {
            *slot = None;
        }
    }
}

#[derive(Debug, Default)]
struct PlayerState {
    current: Option<Playback>,
    generation: u64,
}

/// Frame downloader and playback clock. Clones share state.
#[derive(Debug, Clone)]
pub struct FrameDownloader {
    session: Arc<Session>,
    state: Arc<Mutex<PlayerState>>,
}

impl FrameDownloader {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            state: Arc::new(Mutex::new(PlayerState::default())),
        }
    }

    /// Fastload needs the packed image format.
    pub fn fastload(&self) -> bool {
        self.session.config.fastload && self.session.config.image_fallback
    }

    /// Replaces whatever was playing with `sequence` and starts the first
    /// download.
    pub fn start_playback(&self, sequence: Sequence) -> Option<JoinHandle<()>> {
        let frame_time_ms =
            saturating_millis(sequence.frame_time(self.session.config.default_frame_time()));
        {
            let mut state = self.lock();
            if let Some(mut previous) = state.current.take() {
                previous.release();
            }
            state.generation += 1;
            info!(
                id = %sequence.id,
                frames = sequence.frame_count(),
                frame_time_ms,
                fastload = self.fastload(),
                "starting playback"
            );
            state.current = Some(Playback {
                cache: vec![None; sequence.frame_count()],
                generation: state.generation,
                sequence,
                downloaded: 0,
                downloading: false,
                fastload_done: false,
                cursor: 0,
                timer_ms: 0,
                frame_time_ms,
            });
        }
        self.download_next()
    }

    /// Starts the next unit of work unless one is running or nothing is
    /// missing.
    pub fn download_next(&self) -> Option<JoinHandle<()>> {
        let fastload = self.fastload();
        let (identity, index) = {
            let mut state = self.lock();
            let playback = state.current.as_mut()?;
            if playback.downloading {
                return None;
            }
            let index = playback.next_unit(fastload)?;
            playback.downloading = true;
            (playback.identity(), index)
        };
        Some(tokio::spawn(self.clone().download_unit(identity, index, fastload)))
    }

    /// Stops playback and clears every cached frame.
    pub fn stop(&self) {
        let mut state = self.lock();
        if let Some(mut playback) = state.current.take() {
            playback.release();
            info!(id = %playback.sequence.id, "stopped playback");
        }
    }

    /// Advances the playback clock by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        let mut state = self.lock();
        let Some(playback) = state.current.as_mut() else {
            return;
        };
        playback.timer_ms = playback.timer_ms.saturating_add(delta_ms);
        if playback.timer_ms >= playback.frame_time_ms {
            if !playback.cache.is_empty() {
                playback.cursor = (playback.cursor + 1) % playback.cache.len();
            }
            playback.timer_ms = 0;
        }
    }

    /// Render-loop hook: advances the clock and resumes downloading when
    /// idle with frames still missing.
    pub fn tick(&self, delta_ms: u64) -> Option<JoinHandle<()>> {
        self.advance(delta_ms);
        self.download_next()
    }

    /// The last downloaded frame at or before the playback cursor.
    pub fn current_frame(&self) -> Option<Frame> {
        self.lock().current.as_ref().and_then(Playback::current_frame)
    }

    pub fn progress(&self) -> Option<Progress> {
        let blocked = !self.session.is_connected();
        self.lock().current.as_ref().map(|playback| Progress {
            downloaded: playback.downloaded,
            total: playback.cache.len(),
            blocked,
        })
    }

    pub fn current_sequence(&self) -> Option<Sequence> {
        self.lock().current.as_ref().map(|p| p.sequence.clone())
    }

    pub fn identity(&self) -> Option<PlaybackIdentity> {
        self.lock().current.as_ref().map(Playback::identity)
    }

    pub fn is_current(&self, identity: &PlaybackIdentity) -> bool {
        self.lock()
            .current
            .as_ref()
            .is_some_and(|playback| playback.matches(identity))
    }

    pub fn is_downloading(&self) -> bool {
        self.lock().current.as_ref().is_some_and(|p| p.downloading)
    }

    /// Every cached slot, for export.
    pub fn cached_frames(&self) -> Vec<Option<Bytes>> {
        self.lock()
            .current
            .as_ref()
            .map(|p| p.cache.clone())
            .unwrap_or_default()
    }

    async fn download_unit(self, identity: PlaybackIdentity, index: usize, fastload: bool) {
        tokio::time::sleep(self.session.config.timing.chain_yield()).await;

        let Some(frame_id) = self.frame_id(&identity, index) else {
            return;
        };
        let session = Arc::clone(&self.session);
        let api = &session.api;
        let auth = &session.auth;
        let sequence_id = identity.sequence_id.as_str();
        let frame = frame_id.as_str();
        debug!(id = sequence_id, index, fastload, "downloading frame");

        let result = with_retries(
            "download frame",
            session.config.retry.frame(),
            session.gate(),
            || self.is_current(&identity),
            move |_| async move { api.frame(sequence_id, frame, fastload, &auth.headers()).await },
        )
        .await;

        match result {
            Ok(bytes) => {
                if self.store(&identity, index, fastload, bytes) && !fastload {
                    self.download_next();
                }
            }
            Err(RetryError::Stale) => debug!(id = sequence_id, index, "frame download abandoned"),
            Err(err @ RetryError::Exhausted { .. }) => {
                warn!(id = sequence_id, index, error = %err, "failed to download frame");
                self.finish(&identity);
            }
        }
    }

    fn frame_id(&self, identity: &PlaybackIdentity, index: usize) -> Option<String> {
        let mut state = self.lock();
        let playback = state.current.as_mut().filter(|p| p.matches(identity))?;
        let frame_id = playback.sequence.frames.get(index).cloned();
        if frame_id.is_none() {
            playback.downloading = false;
        }
        frame_id
    }

    /// Writes a downloaded unit into the cache. Returns whether the
    /// playback was still current.
    fn store(&self, identity: &PlaybackIdentity, index: usize, fastload: bool, bytes: Bytes) -> bool {
        let mut state = self.lock();
        let Some(playback) = state.current.as_mut().filter(|p| p.matches(identity)) else {
            return false;
        };

        if fastload {
            let decoded = decode_fastload(&bytes, playback.cache.len());
            let count = decoded.frames.len();
            for (slot, frame) in playback.cache.iter_mut().zip(decoded.frames) {
                *slot = Some(frame);
            }
            playback.downloaded = count;
            playback.fastload_done = true;
            debug!(id = %identity.sequence_id, count, "stored fastload frames");
        } else if let Some(slot) = playback.cache.get_mut(index) {
            if slot.is_none() {
                playback.downloaded += 1;
            }
            *slot = Some(bytes);
            debug!(id = %identity.sequence_id, index, "stored frame");
        }
        playback.downloading = false;

        if playback.downloaded >= playback.cache.len() {
            info!(id = %identity.sequence_id, "sequence fully downloaded");
        }
        true
    }

    fn finish(&self, identity: &PlaybackIdentity) {
        let mut state = self.lock();
        if let Some(playback) = state.current.as_mut().filter(|p| p.matches(identity)) {
            playback.downloading = false;
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
