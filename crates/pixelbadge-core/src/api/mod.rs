//! HTTP client for the gallery server.
//!
//! One method per endpoint. Each call issues exactly one request and maps
//! any non-200 status to [`ApiError::Status`]; retrying is the caller's
//! business (see [`crate::retry`]).

mod types;

use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

pub use types::{
    ErrorBody, LoginCheck, LoginCheckResponse, LoginCodeResponse, SequencePage, SequenceRecord,
};

use crate::error::ApiError;
use crate::store::FavoritesList;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CODE_EXPIRED: &str = "code_expired";

/// `auth_token` / `badge_uuid` request headers. Absent values are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders {
    auth_token: Option<String>,
    badge_uuid: Option<String>,
}

impl AuthHeaders {
    pub fn new(auth_token: Option<String>, badge_uuid: Option<String>) -> Self {
        Self {
            auth_token: auth_token.filter(|t| !t.is_empty()),
            badge_uuid: badge_uuid.filter(|u| !u.is_empty()),
        }
    }

    fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("auth_token", self.auth_token.as_deref()),
            ("badge_uuid", self.badge_uuid.as_deref()),
        ] {
            if let Some(value) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
                headers.insert(HeaderName::from_static(name), value);
            }
        }
        headers
    }
}

/// Which sequences listing to request.
#[derive(Debug, Clone, Copy)]
pub enum SequenceQuery<'a> {
    /// Server-side sort by name (`popular`, `random`, `new`).
    Sorted(&'a str),
    /// The caller's favorites, sent as the request body.
    Favorites(&'a FavoritesList),
}

#[derive(Serialize)]
struct LoginCodeRequest<'a> {
    badge_uuid: Option<&'a str>,
}

#[derive(Serialize)]
struct CheckLoginCodeRequest<'a> {
    code: &'a str,
}

#[derive(Serialize)]
struct LogoutRequest<'a> {
    auth_token: &'a str,
}

/// Gallery API client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    image_fallback: bool,
    http: reqwest::Client,
}

impl ApiClient {
    /// Creates a client rooted at `base_url`.
    ///
    /// `image_fallback` requests the raw packed image format
    /// (`fallback=true`) from the sequence, thumbnail and frame endpoints.
    ///
    /// # Errors
    /// Returns an error if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str, image_fallback: bool) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid base URL: {base_url}");
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url,
            image_fallback,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn image_fallback(&self) -> bool {
        self.image_fallback
    }

    /// `GET /api/sequences?page={page}[&sort={mode}][&fallback=true]`
    ///
    /// # Errors
    /// Returns an error on transport failure, non-200 status or a body that
    /// is not a sequences page.
    pub async fn sequences(
        &self,
        query: SequenceQuery<'_>,
        page: u32,
        auth: &AuthHeaders,
    ) -> Result<SequencePage, ApiError> {
        let mut url = self.endpoint(&["api", "sequences"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page", &page.to_string());
            if let SequenceQuery::Sorted(sort) = query {
                pairs.append_pair("sort", sort);
            }
            if self.image_fallback {
                pairs.append_pair("fallback", "true");
            }
        }
        debug!(%url, "fetching sequences");

        let mut request = self.http.get(url).headers(auth.to_header_map());
        if let SequenceQuery::Favorites(favorites) = query {
            request = request.json(favorites);
        }
        let response = request.send().await?;
        json_body(response).await
    }

    /// `GET /api/sequence/{id}/thumbnail[?fallback=true]`
    ///
    /// # Errors
    /// Returns an error on transport failure or non-200 status.
    pub async fn thumbnail(&self, sequence_id: &str, auth: &AuthHeaders) -> Result<Bytes, ApiError> {
        let mut url = self.endpoint(&["api", "sequence", sequence_id, "thumbnail"]);
        if self.image_fallback {
            url.query_pairs_mut().append_pair("fallback", "true");
        }
        self.get_bytes(url, auth).await
    }

    /// `GET /images/{sequence}/{frame}[?fallback=true[&fastload=true]]`
    ///
    /// With `fastload` the body holds every frame of the sequence.
    /// `fastload` only takes effect together with image fallback.
    ///
    /// # Errors
    /// Returns an error on transport failure or non-200 status.
    pub async fn frame(
        &self,
        sequence_id: &str,
        frame_id: &str,
        fastload: bool,
        auth: &AuthHeaders,
    ) -> Result<Bytes, ApiError> {
        let mut url = self.endpoint(&["images", sequence_id, frame_id]);
        if self.image_fallback {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("fallback", "true");
            if fastload {
                pairs.append_pair("fastload", "true");
            }
        }
        self.get_bytes(url, auth).await
    }

    /// `POST /api/sequence/{id}/mark_favorite` or `/remove_favorite`.
    ///
    /// # Errors
    /// Returns an error on transport failure or non-200 status.
    pub async fn set_favorite(
        &self,
        sequence_id: &str,
        favorited: bool,
        auth: &AuthHeaders,
    ) -> Result<(), ApiError> {
        let action = if favorited {
            "mark_favorite"
        } else {
            "remove_favorite"
        };
        let url = self.endpoint(&["api", "sequence", sequence_id, action]);
        let response = self.http.post(url).headers(auth.to_header_map()).send().await?;
        ensure_ok(&response)?;
        Ok(())
    }

    /// `POST /api/get_login_code {badge_uuid}`
    ///
    /// # Errors
    /// Returns an error on transport failure, non-200 status or bad body.
    pub async fn login_code(
        &self,
        badge_uuid: Option<&str>,
        auth: &AuthHeaders,
    ) -> Result<LoginCodeResponse, ApiError> {
        let url = self.endpoint(&["api", "get_login_code"]);
        let response = self
            .http
            .post(url)
            .headers(auth.to_header_map())
            .json(&LoginCodeRequest { badge_uuid })
            .send()
            .await?;
        json_body(response).await
    }

    /// `POST /api/check_login_code {code}`
    ///
    /// 200 with a non-empty token is [`LoginCheck::Authenticated`], 200
    /// without one is [`LoginCheck::Pending`], 401 with
    /// `error == "code_expired"` is [`LoginCheck::Expired`].
    ///
    /// # Errors
    /// Any other status, a transport failure or an unreadable body.
    pub async fn check_login_code(
        &self,
        code: &str,
        auth: &AuthHeaders,
    ) -> Result<LoginCheck, ApiError> {
        let url = self.endpoint(&["api", "check_login_code"]);
        let response = self
            .http
            .post(url)
            .headers(auth.to_header_map())
            .json(&CheckLoginCodeRequest { code })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: LoginCheckResponse = json_body(response).await?;
                Ok(match body.auth_token.filter(|t| !t.is_empty()) {
                    Some(auth_token) => LoginCheck::Authenticated {
                        auth_token,
                        badge_uuid: body.badge_uuid.filter(|u| !u.is_empty()),
                    },
                    None => LoginCheck::Pending,
                })
            }
            StatusCode::UNAUTHORIZED => {
                let bytes = response.bytes().await?;
                let body: ErrorBody = serde_json::from_slice(&bytes)?;
                if body.error.as_deref() == Some(CODE_EXPIRED) {
                    Ok(LoginCheck::Expired)
                } else {
                    Err(ApiError::Status(StatusCode::UNAUTHORIZED))
                }
            }
            status => Err(ApiError::Status(status)),
        }
    }

    /// `POST /api/logout_badge {auth_token}`
    ///
    /// # Errors
    /// Returns an error on transport failure or non-200 status.
    pub async fn logout(&self, auth_token: &str, auth: &AuthHeaders) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "logout_badge"]);
        let response = self
            .http
            .post(url)
            .headers(auth.to_header_map())
            .json(&LogoutRequest { auth_token })
            .send()
            .await?;
        ensure_ok(&response)?;
        Ok(())
    }

    async fn get_bytes(&self, url: Url, auth: &AuthHeaders) -> Result<Bytes, ApiError> {
        debug!(%url, "downloading");
        let response = self.http.get(url).headers(auth.to_header_map()).send().await?;
        ensure_ok(&response)?;
        Ok(response.bytes().await?)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn ensure_ok(response: &reqwest::Response) -> Result<(), ApiError> {
    match response.status() {
        StatusCode::OK => Ok(()),
        status => Err(ApiError::Status(status)),
    }
}

async fn json_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    ensure_ok(&response)?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
