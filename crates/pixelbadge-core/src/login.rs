//! Pairing-code login.
//!
//! `Idle -> CodeRequested -> Polling -> {Authenticated | Expired | Error}`
//!
//! Entering the login view requests a pairing code, then polls until the
//! code is claimed on the website or expires. Leaving the view cancels the
//! session's token and bumps its generation, so nothing started for it
//! touches state afterwards.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::LoginCheck;
use crate::error::{ApiError, RetryError};
use crate::retry::with_retries;
use crate::session::Session;
use crate::store::mask_token;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    CodeRequested,
    Polling { code: String },
    Authenticated,
    Expired { code: String },
    /// Every attempt to get a pairing code failed.
    Error,
}

impl LoginState {
    /// The pairing code to show, if one was issued.
    pub fn code(&self) -> Option<&str> {
        match self {
            LoginState::Polling { code } | LoginState::Expired { code } => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct LoginInner {
    state: LoginState,
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// Login flow handle. Clones share state.
#[derive(Debug, Clone)]
pub struct LoginFlow {
    session: Arc<Session>,
    inner: Arc<Mutex<LoginInner>>,
}

impl LoginFlow {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            inner: Arc::new(Mutex::new(LoginInner {
                state: LoginState::Idle,
                generation: 0,
                cancel: None,
            })),
        }
    }

    pub fn state(&self) -> LoginState {
        self.lock().state.clone()
    }

    /// Enters the login view. Starts a new pairing session unless already
    /// logged in.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let logged_in = self.session.is_logged_in();
        let (generation, token) = {
            let mut inner = self.lock();
            if let Some(previous) = inner.cancel.take() {
                previous.cancel();
            }
            inner.generation += 1;
            if logged_in {
                inner.state = LoginState::Authenticated;
                return None;
            }
            let token = CancellationToken::new();
            inner.cancel = Some(token.clone());
            inner.state = LoginState::CodeRequested;
            (inner.generation, token)
        };
        Some(tokio::spawn(self.clone().run(generation, token)))
    }

    /// Leaves the login view, cancelling any fetch or poll.
    pub fn exit(&self) {
        let mut inner = self.lock();
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        inner.generation += 1;
        inner.state = LoginState::Idle;
    }

    /// Clears the credential and tells the server, best effort.
    ///
    /// The local credential is cleared before any network activity. The
    /// returned task never reports failure.
    pub fn logout(&self) -> Option<JoinHandle<()>> {
        let previous = match self.session.auth.log_out() {
            Ok(previous) => previous,
            Err(err) => {
                warn!(error = %err, "failed to persist logout");
                None
            }
        };
        self.exit();
        let auth_token = previous?;
        info!(token = %mask_token(&auth_token), "logged out");

        let session = Arc::clone(&self.session);
        Some(tokio::spawn(async move {
            session.gate().wait("logout").await;
            match session
                .api
                .logout(&auth_token, &session.auth.headers())
                .await
            {
                Ok(()) => debug!("server session invalidated"),
                Err(err) => warn!(error = %err, "failed to invalidate server session"),
            }
        }))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Sets `state` if `generation` is still current.
    fn transition(&self, generation: u64, state: LoginState) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        debug!(?state, "login state");
        inner.state = state;
        true
    }

    async fn run(self, generation: u64, token: CancellationToken) {
        tokio::select! {
            () = token.cancelled() => debug!("login session cancelled"),
            () = self.drive(generation) => {}
        }
    }

    async fn drive(&self, generation: u64) {
        let Some(code) = self.request_code(generation).await else {
            return;
        };
        if !self.transition(generation, LoginState::Polling { code: code.clone() }) {
            return;
        }
        info!("received login code");
        self.poll(generation, &code).await;
    }

    async fn request_code(&self, generation: u64) -> Option<String> {
        let session = &self.session;
        let api = &session.api;
        let auth = &session.auth;

        let result = with_retries(
            "get login code",
            session.config.retry.login_code(),
            session.gate(),
            || self.is_current(generation),
            move |_| async move {
                let badge_uuid = auth.badge_uuid();
                let response = api.login_code(badge_uuid.as_deref(), &auth.headers()).await?;
                let code = response
                    .code
                    .filter(|c| !c.is_empty())
                    .ok_or(ApiError::Missing("code"))?;
                Ok((code, response.badge_uuid.filter(|u| !u.is_empty())))
            },
        )
        .await;

        match result {
            Ok((code, badge_uuid)) => {
                if let Some(uuid) = badge_uuid
                    && let Err(err) = auth.set_badge_uuid(&uuid)
                {
                    warn!(error = %err, "failed to save badge identity");
                }
                Some(code)
            }
            Err(RetryError::Stale) => None,
            Err(err @ RetryError::Exhausted { .. }) => {
                warn!(error = %err, "failed to get login code");
                self.transition(generation, LoginState::Error);
                None
            }
        }
    }

    async fn poll(&self, generation: u64, code: &str) {
        let session = &self.session;
        let interval = session.config.timing.login_poll();

        loop {
            tokio::time::sleep(interval).await;
            session.gate().wait("poll login code").await;
            if !self.is_current(generation) {
                return;
            }
            if session.is_logged_in() {
                self.transition(generation, LoginState::Authenticated);
                return;
            }

            let outcome = session
                .api
                .check_login_code(code, &session.auth.headers())
                .await;
            if !self.is_current(generation) {
                return;
            }

            match outcome {
                Ok(LoginCheck::Authenticated {
                    auth_token,
                    badge_uuid,
                }) => {
                    if let Err(err) = session.auth.log_in(&auth_token, badge_uuid.as_deref()) {
                        warn!(error = %err, "failed to save credential");
                    }
                    info!(token = %mask_token(&auth_token), "logged in");
                    self.transition(generation, LoginState::Authenticated);
                    return;
                }
                Ok(LoginCheck::Expired) => {
                    info!("login code expired");
                    self.transition(
                        generation,
                        LoginState::Expired {
                            code: code.to_string(),
                        },
                    );
                    return;
                }
                Ok(LoginCheck::Pending) => debug!("login code not claimed yet"),
                Err(err) => warn!(error = %err, "failed to check login code"),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoginInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
