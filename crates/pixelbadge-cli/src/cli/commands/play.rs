//! Sequence download and frame export.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pixelbadge_core::Session;
use pixelbadge_core::frames::FrameDownloader;
use pixelbadge_core::gallery::SortMode;
use pixelbadge_core::packed::PackedImage;

use super::browse::{load_page, title, username};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub async fn run(
    session: Arc<Session>,
    sort: SortMode,
    page: u32,
    index: usize,
    export: Option<&Path>,
) -> Result<()> {
    let snapshot = load_page(Arc::clone(&session), sort, page).await?;
    let Some(sequence) = snapshot.sequences.get(index).cloned() else {
        anyhow::bail!(
            "No sequence at index {index} ({} on {sort} page {page})",
            snapshot.sequences.len()
        );
    };
    println!(
        "Playing {} by {} ({} frames)",
        title(&sequence),
        username(&sequence),
        sequence.frame_count()
    );

    let player = FrameDownloader::new(session);
    let id = sequence.id.clone();
    if let Some(handle) = player.start_playback(sequence) {
        handle.await.context("frame download task")?;
    }
    wait_for_frames(&player).await;

    let progress = player.progress().context("playback ended unexpectedly")?;
    println!(
        "Downloaded {}/{} frames of {id}",
        progress.downloaded, progress.total
    );

    if let Some(dir) = export {
        let written = export_frames(&player.cached_frames(), dir)?;
        println!("Wrote {written} frames to {}", dir.display());
    }
    player.stop();
    Ok(())
}

/// Drives downloads until every frame is cached or a full resume round
/// adds nothing.
async fn wait_for_frames(player: &FrameDownloader) {
    let mut last_downloaded = None;
    loop {
        if player.is_downloading() {
            tokio::time::sleep(POLL_INTERVAL).await;
            continue;
        }
        let Some(progress) = player.progress() else {
            return;
        };
        if progress.is_complete() || last_downloaded == Some(progress.downloaded) {
            return;
        }
        last_downloaded = Some(progress.downloaded);
        match player.download_next() {
            Some(handle) => {
                if let Err(err) = handle.await {
                    tracing::warn!(error = %err, "frame download task failed");
                    return;
                }
            }
            None => tokio::time::sleep(POLL_INTERVAL).await,
        }
    }
}

/// Writes packed frames as PNG and anything else as raw bytes.
fn export_frames(frames: &[Option<bytes::Bytes>], dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let mut written = 0;
    for (index, data) in frames.iter().enumerate() {
        let Some(data) = data else {
            continue;
        };
        match PackedImage::new(data.clone()).and_then(|image| image.to_rgb_image()) {
            Some(image) => {
                let path = dir.join(format!("frame-{index:03}.png"));
                image
                    .save(&path)
                    .with_context(|| format!("write {}", path.display()))?;
            }
            None => {
                let path = dir.join(format!("frame-{index:03}.bin"));
                fs::write(&path, data).with_context(|| format!("write {}", path.display()))?;
            }
        }
        written += 1;
    }
    Ok(written)
}
