//! CLI command handlers.

pub mod browse;
pub mod config;
pub mod favorite;
pub mod login;
pub mod play;
pub mod status;
pub mod website;
