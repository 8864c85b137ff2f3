//! Wire records for the gallery API.
//!
//! Every optional field is an `Option` and validated once here; the rest
//! of the crate works with [`crate::sequence::Sequence`].

use serde::Deserialize;

/// One entry of `GET /api/sequences`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SequenceRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub frames: Vec<String>,
    #[serde(default)]
    pub frame_time_ms: Option<i64>,
    #[serde(default)]
    pub favorited_by_current_user: Option<bool>,
    /// Base64 packed thumbnail, present when the server embeds thumbnails.
    #[serde(default)]
    pub thumbnail_path: Option<String>,
}

/// Response of `GET /api/sequences`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SequencePage {
    #[serde(default)]
    pub sequences: Option<Vec<SequenceRecord>>,
    #[serde(default)]
    pub total_page_count: Option<i64>,
    #[serde(default)]
    pub next_page_exists: Option<bool>,
    /// Badge identity offered to devices that have none yet.
    #[serde(default)]
    pub random_uuid: Option<String>,
}

impl SequencePage {
    /// Highest page index after loading `current`.
    ///
    /// A positive `total_page_count` replaces `previous_max`. A next page
    /// extends the bound to at least `current + 1`; no next page clamps it
    /// to `current`.
    pub fn max_page(&self, current: u32, previous_max: u32) -> u32 {
        let mut max_page = previous_max;
        if let Some(total) = self.total_page_count.filter(|total| *total > 0) {
            max_page = u32::try_from(total).unwrap_or(u32::MAX);
        }
        if self.next_page_exists.unwrap_or(false) {
            max_page.max(current.saturating_add(1))
        } else {
            current
        }
    }

    pub fn random_uuid(&self) -> Option<&str> {
        self.random_uuid.as_deref().filter(|uuid| !uuid.is_empty())
    }
}

/// Response of `POST /api/get_login_code`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginCodeResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub badge_uuid: Option<String>,
}

/// 200 response of `POST /api/check_login_code`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginCheckResponse {
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub badge_uuid: Option<String>,
}

/// Error body returned with 4xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Outcome of one login code status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginCheck {
    Authenticated {
        auth_token: String,
        badge_uuid: Option<String>,
    },
    Expired,
    /// Not claimed yet.
    Pending,
}
