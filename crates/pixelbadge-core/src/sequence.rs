//! Animation sequences as the rest of the crate sees them.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use tracing::warn;

use crate::api::SequenceRecord;
use crate::packed::PackedImage;

/// One animation from the gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub id: String,
    pub title: Option<String>,
    pub username: Option<String>,
    /// Frame ids in playback order.
    pub frames: Vec<String>,
    /// Declared frame time; only positive values are kept.
    pub frame_time_ms: Option<u64>,
    pub favorited_by_current_user: bool,
    pub thumbnail: Option<PackedImage>,
}

impl Sequence {
    /// Converts a wire record. Embedded thumbnails are decoded only when
    /// `embedded_thumbnails` is set.
    pub fn from_record(record: SequenceRecord, embedded_thumbnails: bool) -> Self {
        let thumbnail = if embedded_thumbnails {
            record
                .thumbnail_path
                .as_deref()
                .and_then(|encoded| decode_embedded_thumbnail(&record.id, encoded))
        } else {
            None
        };

        Self {
            frame_time_ms: record
                .frame_time_ms
                .filter(|ms| *ms > 0)
                .and_then(|ms| u64::try_from(ms).ok()),
            favorited_by_current_user: record.favorited_by_current_user.unwrap_or(false),
            id: record.id,
            title: record.title,
            username: record.username,
            frames: record.frames,
            thumbnail,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Declared frame time, or `default` when the sequence has none.
    pub fn frame_time(&self, default: Duration) -> Duration {
        self.frame_time_ms.map_or(default, Duration::from_millis)
    }
}

/// Converts a page of records, decoding embedded thumbnails when the
/// first record carries one.
///
/// Returns the sequences and whether thumbnails were embedded.
pub fn from_records(records: Vec<SequenceRecord>) -> (Vec<Sequence>, bool) {
    let embedded = records
        .first()
        .is_some_and(|record| record.thumbnail_path.is_some());
    let sequences = records
        .into_iter()
        .map(|record| Sequence::from_record(record, embedded))
        .collect();
    (sequences, embedded)
}

fn decode_embedded_thumbnail(id: &str, encoded: &str) -> Option<PackedImage> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    match STANDARD.decode(cleaned) {
        Ok(raw) => {
            let image = PackedImage::new(Bytes::from(raw));
            if image.is_none() {
                warn!(id, "embedded thumbnail is truncated");
            }
            image
        }
        Err(err) => {
            warn!(id, error = %err, "embedded thumbnail is not valid base64");
            None
        }
    }
}
