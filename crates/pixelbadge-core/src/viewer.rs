//! View router: the composition root of the viewer.
//!
//! Owns every component and forwards input and ticks to the active view.
//! Switching views runs the outgoing view's exit hook and then the
//! incoming view's start hook.

use std::sync::Arc;

use tracing::debug;

use crate::favorites::FavoriteManager;
use crate::frames::FrameDownloader;
use crate::gallery::{Activation, Gallery};
use crate::input::RepeatTrigger;
use crate::login::LoginFlow;
use crate::sequence::Sequence;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Thumbnails,
    Playing,
    Metadata,
    Login,
    Website,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterAction {
    None,
    /// CANCEL on the gallery: leave the viewer.
    ExitApp,
}

/// What the metadata view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataView {
    pub sequence: Sequence,
    pub favorited: bool,
    /// Favorites can only be toggled when logged in.
    pub can_favorite: bool,
}

/// Held-button repeat for gallery navigation.
#[derive(Debug)]
struct Repeater {
    button: Button,
    delta: isize,
    trigger: RepeatTrigger,
}

#[derive(Debug)]
pub struct Router {
    session: Arc<Session>,
    pub gallery: Gallery,
    pub player: FrameDownloader,
    pub favorites: FavoriteManager,
    pub login: LoginFlow,
    view: View,
    repeaters: [Repeater; 3],
}

impl Router {
    pub fn new(session: Arc<Session>) -> Self {
        let input = &session.config.input;
        let repeater = |button, delta| Repeater {
            button,
            delta,
            trigger: RepeatTrigger::new(input.repeat_delay_ms, input.repeat_interval_ms),
        };
        let repeaters = [
            repeater(Button::Down, COLUMNS_DELTA),
            repeater(Button::Left, -1),
            repeater(Button::Right, 1),
        ];
        Self {
            gallery: Gallery::new(Arc::clone(&session)),
            player: FrameDownloader::new(Arc::clone(&session)),
            favorites: FavoriteManager::new(Arc::clone(&session)),
            login: LoginFlow::new(Arc::clone(&session)),
            session,
            view: View::Thumbnails,
            repeaters,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn view(&self) -> View {
        self.view
    }

    /// Shows the gallery, fetching it if it is empty.
    pub fn start(&mut self) {
        self.view = View::Thumbnails;
        self.enter(View::Thumbnails);
    }

    /// Switches views, running exit and start hooks.
    pub fn set_view(&mut self, view: View) {
        debug!(from = ?self.view, to = ?view, "switching view");
        self.leave(self.view);
        self.view = view;
        self.enter(view);
    }

    fn enter(&mut self, view: View) {
        match view {
            View::Thumbnails => {
                self.gallery.on_start();
            }
            View::Login => {
                self.login.start();
            }
            View::Playing | View::Metadata | View::Website => {}
        }
    }

    fn leave(&mut self, view: View) {
        match view {
            View::Thumbnails => {
                for repeater in &mut self.repeaters {
                    repeater.trigger.release();
                }
            }
            View::Login => self.login.exit(),
            View::Playing | View::Metadata | View::Website => {}
        }
    }

    pub fn button_down(&mut self, button: Button) -> RouterAction {
        match self.view {
            View::Thumbnails => return self.thumbnails_input(button),
            View::Playing => match button {
                Button::Cancel => {
                    self.player.stop();
                    self.set_view(View::Thumbnails);
                }
                Button::Confirm => {
                    if let Some(sequence) = self.player.current_sequence() {
                        self.favorites.set_sequence(sequence);
                        self.set_view(View::Metadata);
                    }
                }
                _ => {}
            },
            View::Metadata => match button {
                Button::Cancel => self.set_view(View::Playing),
                Button::Confirm if self.session.is_logged_in() => {
                    self.favorites.toggle();
                }
                _ => {}
            },
            View::Login => match button {
                Button::Cancel => self.set_view(View::Thumbnails),
                Button::Right if self.session.is_logged_in() => {
                    self.login.logout();
                    self.set_view(View::Thumbnails);
                }
                Button::Confirm => self.set_view(View::Website),
                _ => {}
            },
            View::Website => {
                if button == Button::Cancel {
                    self.set_view(View::Thumbnails);
                }
            }
        }
        RouterAction::None
    }

    pub fn button_up(&mut self, button: Button) {
        for repeater in &mut self.repeaters {
            if repeater.button == button {
                repeater.trigger.release();
            }
        }
    }

    fn thumbnails_input(&mut self, button: Button) -> RouterAction {
        if let Some(repeater) = self.repeaters.iter_mut().find(|r| r.button == button) {
            if repeater.trigger.press() {
                self.gallery.navigate(repeater.delta);
            }
            return RouterAction::None;
        }

        match button {
            Button::Up => {
                self.gallery.cycle_sort();
            }
            Button::Confirm => match self.gallery.activate() {
                Activation::Play(sequence) => {
                    self.player.start_playback(sequence);
                    self.set_view(View::Playing);
                }
                Activation::OpenAccount => self.set_view(View::Login),
                Activation::PageChanged | Activation::Nothing => {}
            },
            Button::Cancel => return RouterAction::ExitApp,
            Button::Down | Button::Left | Button::Right => {}
        }
        RouterAction::None
    }

    /// Per-frame tick: repeat triggers in the gallery, the playback clock
    /// and download resume while playing.
    pub fn update(&mut self, delta_ms: u64) {
        match self.view {
            View::Thumbnails => {
                for repeater in &mut self.repeaters {
                    if repeater.trigger.update(delta_ms) {
                        self.gallery.navigate(repeater.delta);
                    }
                }
            }
            View::Playing => {
                self.player.tick(delta_ms);
            }
            View::Metadata | View::Login | View::Website => {}
        }
    }

    pub fn metadata(&self) -> Option<MetadataView> {
        self.favorites.sequence().map(|sequence| MetadataView {
            sequence,
            favorited: self.favorites.is_favorited(),
            can_favorite: self.session.is_logged_in(),
        })
    }

    pub fn website_url(&self) -> &str {
        &self.session.config.website_url
    }

    /// Soft-button labels of the active view.
    pub fn button_labels(&self) -> Vec<(Button, &'static str)> {
        match self.view {
            View::Login if self.session.is_logged_in() => vec![
                (Button::Cancel, "Exit"),
                (Button::Right, "Logout"),
                (Button::Confirm, "Website"),
            ],
            View::Login => vec![(Button::Cancel, "Exit"), (Button::Confirm, "Website")],
            View::Website => vec![(Button::Cancel, "Back")],
            View::Thumbnails | View::Playing | View::Metadata => Vec::new(),
        }
    }
}

/// DOWN moves one grid row.
const COLUMNS_DELTA: isize = crate::gallery::COLUMNS as isize;
