use std::sync::Arc;

use anyhow::{Context, Result};
use pixelbadge_core::Session;
use pixelbadge_core::favorites::FavoriteManager;

pub async fn run(session: Arc<Session>, id: &str, favorited: bool) -> Result<()> {
    if !session.is_logged_in() {
        anyhow::bail!("Log in first (run `pixelbadge login`)");
    }
    let manager = FavoriteManager::new(session);
    manager
        .set(id, favorited)
        .await
        .context("favorite sync task")?;

    if !favorited {
        println!("Removed favorite {id}");
    } else if manager.is_local_favorite(id) {
        // Sync failures fall back to the local list.
        println!("Saved favorite {id} locally; the server could not be reached");
    } else {
        println!("Favorited {id}");
    }
    Ok(())
}
