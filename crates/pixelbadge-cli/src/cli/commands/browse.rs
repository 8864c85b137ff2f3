//! Gallery listing.

use std::sync::Arc;

use anyhow::{Context, Result};
use pixelbadge_core::Session;
use pixelbadge_core::gallery::{Gallery, GallerySnapshot, SortMode};
use pixelbadge_core::sequence::Sequence;

pub async fn run(session: Arc<Session>, sort: SortMode, page: u32) -> Result<()> {
    let snapshot = load_page(session, sort, page).await?;

    println!(
        "{} - page {}/{}",
        snapshot.sort, snapshot.page, snapshot.max_page
    );
    if snapshot.sequences.is_empty() {
        println!("No sequences on this page.");
        return Ok(());
    }
    for (index, sequence) in snapshot.sequences.iter().enumerate() {
        let favorite = if sequence.favorited_by_current_user {
            " *"
        } else {
            ""
        };
        println!(
            "{index:>3}  {}  {} by {} ({} frames){favorite}",
            sequence.id,
            title(sequence),
            username(sequence),
            sequence.frame_count()
        );
    }
    Ok(())
}

pub(super) fn title(sequence: &Sequence) -> &str {
    sequence.title.as_deref().unwrap_or("untitled")
}

pub(super) fn username(sequence: &Sequence) -> &str {
    sequence.username.as_deref().unwrap_or("unknown")
}

/// Fetches one page and fails if the retry budget ran out.
pub(super) async fn load_page(
    session: Arc<Session>,
    sort: SortMode,
    page: u32,
) -> Result<GallerySnapshot> {
    if sort == SortMode::Favorites && !session.is_logged_in() {
        anyhow::bail!("The favorites sort mode needs a login (run `pixelbadge login`)");
    }
    let attempts = session.config.retry.gallery_attempts;
    let gallery = Gallery::new(session);
    gallery.fetch(sort, page).await.context("gallery fetch task")?;

    let snapshot = gallery.snapshot();
    if snapshot.fetch_error {
        anyhow::bail!("Failed to load {sort} page {page} after {attempts} attempts");
    }
    Ok(snapshot)
}
