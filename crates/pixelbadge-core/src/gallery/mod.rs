//! Paginated, sorted browsing of the remote gallery.
//!
//! The gallery owns the sequence list of the current page. A fetch replaces
//! the list wholesale and then starts the thumbnail chain. Every background
//! step carries the [`PageIdentity`] it was started for and abandons
//! silently once the user has moved to another page or sort mode.

mod paging;
mod thumbnails;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use paging::{COLUMNS, Slot, SlotLayout, VISIBLE_CELLS, Viewport, wrap_index};

use crate::api::{SequencePage, SequenceQuery};
use crate::error::RetryError;
use crate::retry::with_retries;
use crate::sequence::{self, Sequence};
use crate::session::Session;

/// Server-side ordering of the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortMode {
    Popular,
    Favorites,
    Random,
    New,
}

impl SortMode {
    const LOGGED_IN: [SortMode; 4] = [
        SortMode::Popular,
        SortMode::Favorites,
        SortMode::Random,
        SortMode::New,
    ];
    const LOGGED_OUT: [SortMode; 3] = [SortMode::Popular, SortMode::Random, SortMode::New];

    /// Sort modes offered for the given login state. Favorites needs a
    /// credential.
    pub fn available(logged_in: bool) -> &'static [SortMode] {
        if logged_in {
            &Self::LOGGED_IN
        } else {
            &Self::LOGGED_OUT
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Popular => "popular",
            SortMode::Favorites => "favorites",
            SortMode::Random => "random",
            SortMode::New => "new",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "popular" => Ok(SortMode::Popular),
            "favorites" => Ok(SortMode::Favorites),
            "random" => Ok(SortMode::Random),
            "new" => Ok(SortMode::New),
            other => {
                anyhow::bail!("Unknown sort mode: {other} (expected popular, favorites, random, new)")
            }
        }
    }
}

/// Identity of one fetch of one page.
///
/// Two fetches of the same sort mode and page still differ, so a slow
/// response from an earlier visit cannot land in a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageIdentity {
    sort: SortMode,
    page: u32,
    epoch: u64,
}

impl PageIdentity {
    pub fn sort(&self) -> SortMode {
        self.sort
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

/// What CONFIRM did on the selected cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Play(Sequence),
    PageChanged,
    OpenAccount,
    Nothing,
}

/// Point-in-time copy of the gallery for rendering.
#[derive(Debug, Clone)]
pub struct GallerySnapshot {
    pub sort: SortMode,
    pub page: u32,
    pub max_page: u32,
    pub sequences: Vec<Sequence>,
    pub loading: bool,
    /// Sticky until the next fetch starts.
    pub fetch_error: bool,
    pub any_loaded: bool,
    pub selected: usize,
    pub viewport: Viewport,
    pub layout: SlotLayout,
}

#[derive(Debug)]
struct GalleryState {
    sort_index: usize,
    page: u32,
    max_page: u32,
    sequences: Vec<Sequence>,
    loading: bool,
    fetch_error: bool,
    any_loaded: bool,
    selected: usize,
    viewport: Viewport,
    epoch: u64,
}

impl GalleryState {
    fn sort_mode(&self, logged_in: bool) -> SortMode {
        let modes = SortMode::available(logged_in);
        modes[self.sort_index % modes.len()]
    }

    fn identity(&self, logged_in: bool) -> PageIdentity {
        PageIdentity {
            sort: self.sort_mode(logged_in),
            page: self.page,
            epoch: self.epoch,
        }
    }

    fn layout(&self) -> SlotLayout {
        SlotLayout::new(self.sequences.len(), self.page, self.max_page)
    }

    fn reset_selection(&mut self) {
        self.selected = 0;
        self.viewport = Viewport::default();
    }
}

impl Default for GalleryState {
    fn default() -> Self {
        Self {
            sort_index: 0,
            page: 1,
            max_page: 1,
            sequences: Vec::new(),
            loading: false,
            fetch_error: false,
            any_loaded: false,
            selected: 0,
            viewport: Viewport::default(),
            epoch: 0,
        }
    }
}

/// Gallery handle. Clones share state.
#[derive(Debug, Clone)]
pub struct Gallery {
    session: Arc<Session>,
    state: Arc<Mutex<GalleryState>>,
}

impl Gallery {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            state: Arc::new(Mutex::new(GalleryState::default())),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn sort_mode(&self) -> SortMode {
        self.lock().sort_mode(self.session.is_logged_in())
    }

    pub fn page_identity(&self) -> PageIdentity {
        self.lock().identity(self.session.is_logged_in())
    }

    /// Whether `identity` still names the page on screen.
    pub fn is_current(&self, identity: PageIdentity) -> bool {
        self.page_identity() == identity
    }

    pub fn snapshot(&self) -> GallerySnapshot {
        let logged_in = self.session.is_logged_in();
        let state = self.lock();
        GallerySnapshot {
            sort: state.sort_mode(logged_in),
            page: state.page,
            max_page: state.max_page,
            sequences: state.sequences.clone(),
            loading: state.loading,
            fetch_error: state.fetch_error,
            any_loaded: state.any_loaded,
            selected: state.selected,
            viewport: state.viewport,
            layout: state.layout(),
        }
    }

    pub fn layout(&self) -> SlotLayout {
        self.lock().layout()
    }

    pub fn selected_slot(&self) -> Option<Slot> {
        let state = self.lock();
        state.layout().slot(state.selected)
    }

    /// Fetches the first time the view is shown.
    pub fn on_start(&self) -> Option<JoinHandle<()>> {
        let needs_fetch = {
            let state = self.lock();
            state.sequences.is_empty() && !state.loading
        };
        needs_fetch.then(|| self.refresh())
    }

    /// Switches to `sort` and `page` and fetches it.
    ///
    /// Asking for favorites while logged out falls back to the first
    /// available mode.
    pub fn fetch(&self, sort: SortMode, page: u32) -> JoinHandle<()> {
        let modes = SortMode::available(self.session.is_logged_in());
        let sort_index = modes.iter().position(|m| *m == sort).unwrap_or(0);
        {
            let mut state = self.lock();
            if state.sort_index != sort_index {
                state.max_page = 1;
            }
            state.sort_index = sort_index;
            state.page = page.max(1);
            state.reset_selection();
        }
        self.refresh()
    }

    /// Re-fetches the current sort mode and page.
    pub fn refresh(&self) -> JoinHandle<()> {
        let logged_in = self.session.is_logged_in();
        let identity = {
            let mut state = self.lock();
            state.epoch += 1;
            state.sequences.clear();
            state.loading = true;
            state.fetch_error = false;
            state.identity(logged_in)
        };
        info!(sort = %identity.sort, page = identity.page, "fetching sequences");
        tokio::spawn(self.clone().run_fetch(identity))
    }

    /// Advances to the next sort mode and fetches its first page.
    pub fn cycle_sort(&self) -> JoinHandle<()> {
        let count = SortMode::available(self.session.is_logged_in()).len();
        {
            let mut state = self.lock();
            state.sort_index = (state.sort_index + 1) % count;
            state.page = 1;
            state.max_page = 1;
            state.reset_selection();
        }
        self.refresh()
    }

    /// Moves the selection by `delta` cells, wrapping over every slot.
    pub fn navigate(&self, delta: isize) {
        let mut state = self.lock();
        let count = state.layout().slot_count();
        state.selected = wrap_index(state.selected, delta, count);
        let selected = state.selected;
        state.viewport.ensure_visible(selected);
    }

    /// Acts on the selected cell.
    pub fn activate(&self) -> Activation {
        let (slot, page, max_page) = {
            let state = self.lock();
            (state.layout().slot(state.selected), state.page, state.max_page)
        };
        match slot {
            Some(Slot::Sequence(index)) => self
                .lock()
                .sequences
                .get(index)
                .cloned()
                .map_or(Activation::Nothing, Activation::Play),
            Some(Slot::NextPage) => {
                let next = if page < max_page { page + 1 } else { 1 };
                self.change_page(next);
                Activation::PageChanged
            }
            Some(Slot::PrevPage) => {
                self.change_page(page.saturating_sub(1).max(1));
                Activation::PageChanged
            }
            Some(Slot::Account) => Activation::OpenAccount,
            None => Activation::Nothing,
        }
    }

    fn change_page(&self, page: u32) -> JoinHandle<()> {
        {
            let mut state = self.lock();
            state.page = page;
            state.reset_selection();
        }
        self.refresh()
    }

    async fn run_fetch(self, identity: PageIdentity) {
        let session = Arc::clone(&self.session);
        let favorites = (identity.sort == SortMode::Favorites).then(|| session.favorites.load());
        let query = match &favorites {
            Some(list) => SequenceQuery::Favorites(list),
            None => SequenceQuery::Sorted(identity.sort.as_str()),
        };
        let api = &session.api;
        let auth = &session.auth;

        let result = with_retries(
            "fetch sequences",
            session.config.retry.gallery(),
            session.gate(),
            || self.is_current(identity),
            move |_| async move { api.sequences(query, identity.page, &auth.headers()).await },
        )
        .await;

        match result {
            Ok(page) => self.apply_page(identity, page),
            Err(RetryError::Stale) => debug!(page = identity.page, "sequence fetch superseded"),
            Err(err @ RetryError::Exhausted { .. }) => {
                let mut state = self.lock();
                if state.identity(session.is_logged_in()) == identity {
                    warn!(error = %err, sort = %identity.sort, page = identity.page, "failed to fetch sequences");
                    state.sequences.clear();
                    state.loading = false;
                    state.fetch_error = true;
                }
            }
        }
    }

    fn apply_page(&self, identity: PageIdentity, mut page: SequencePage) {
        let records = page.sequences.take().unwrap_or_default();
        let (sequences, embedded) = sequence::from_records(records);
        let count = sequences.len();
        {
            let mut state = self.lock();
            if state.identity(self.session.is_logged_in()) != identity {
                debug!(page = identity.page, "dropping superseded sequence page");
                return;
            }
            state.sequences = sequences;
            state.max_page = page.max_page(identity.page, state.max_page);
            state.loading = false;
            state.any_loaded = true;
            state.fetch_error = false;
            info!(
                count,
                page = identity.page,
                max_page = state.max_page,
                "fetched sequences"
            );
        }

        if let Some(uuid) = page.random_uuid() {
            match self.session.auth.adopt_badge_uuid(uuid) {
                Ok(true) => info!("adopted badge identity from gallery"),
                Ok(false) => {}
                Err(err) => warn!(error = %err, "failed to save badge identity"),
            }
        }

        if !embedded && count > 0 {
            self.spawn_thumbnail(identity, 0);
        }
    }

    fn lock(&self) -> MutexGuard<'_, GalleryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_sort_modes() {
        assert_eq!(SortMode::available(false).len(), 3);
        assert!(!SortMode::available(false).contains(&SortMode::Favorites));
        assert_eq!(SortMode::available(true)[1], SortMode::Favorites);
    }

    #[test]
    fn test_sort_mode_parse() {
        assert_eq!("new".parse::<SortMode>().unwrap(), SortMode::New);
        assert!("oldest".parse::<SortMode>().is_err());
    }

    #[test]
    fn test_sort_index_wraps_with_login_state() {
        let state = GalleryState {
            sort_index: 3,
            ..GalleryState::default()
        };
        assert_eq!(state.sort_mode(true), SortMode::New);
        assert_eq!(state.sort_mode(false), SortMode::Popular);
    }
}
