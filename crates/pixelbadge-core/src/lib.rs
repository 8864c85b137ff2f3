//! Core of the pixelbadge animation viewer.
//!
//! Browses a remote gallery of pixel-art sequences, downloads thumbnails
//! and frames in the background, and drives the login and favorite flows.
//! Every background step re-checks the identity of the view it belongs to
//! and abandons silently once that view has moved on.

pub mod api;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod favorites;
pub mod frames;
pub mod gallery;
pub mod input;
pub mod login;
pub mod packed;
pub mod retry;
pub mod sequence;
pub mod session;
pub mod store;
pub mod viewer;

pub use config::Config;
pub use session::Session;
