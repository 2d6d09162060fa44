//! HTTP session manager for the WSPRNET aggregator.
//!
//! State machine: `Unauthenticated -> Authenticated` on a successful login
//! POST; `Authenticated -> Expired` on an auth redirect, a 401, or a body
//! that fails to parse as the expected JSON listing; `Expired ->
//! Authenticated` via re-login (three consecutive failures raise
//! [`SessionError::FatalCredentials`]).

mod error;
mod state;

pub use error::SessionError;
pub use state::PersistedSession;

use cookie_store::CookieStore;
use reqwest::{Client, StatusCode};
use reqwest_cookie_store::CookieStoreMutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wsprnet_core::model::Spot;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RELOGIN_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Authenticated,
    Expired,
}

pub struct AggregatorSession {
    client: Client,
    cookie_store: Arc<CookieStoreMutex>,
    base_url: String,
    username: String,
    password: String,
    user_agent: String,
    status: SessionStatus,
    pub highest_seen_spot_id: u64,
}

impl AggregatorSession {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        let user_agent = format!("wsprnet-scraper/{}", env!("CARGO_PKG_VERSION"));
        let cookie_store = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let client = Client::builder()
            .cookie_provider(cookie_store.clone())
            .user_agent(user_agent.clone())
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .expect("building the aggregator http client should never fail");

        Self {
            client,
            cookie_store,
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            user_agent,
            status: SessionStatus::Unauthenticated,
            highest_seen_spot_id: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Restores a session from `session_file` if it exists and is younger
    /// than `ttl`; otherwise leaves the session `Unauthenticated` so the
    /// caller logs in fresh.
    pub fn restore_or_new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        session_file: &Path,
        ttl: Duration,
    ) -> Self {
        let mut session = Self::new(base_url, username, password);
        match PersistedSession::load(session_file) {
            Ok(Some(persisted)) => {
                session.highest_seen_spot_id = persisted.highest_seen_spot_id;
                if persisted.is_fresh(ttl.as_secs()) {
                    if let Some(store) = persisted.to_cookie_store() {
                        *session.cookie_store.lock().unwrap() = store;
                        session.status = SessionStatus::Authenticated;
                        info!(file = %session_file.display(), "restored session without re-login");
                    }
                } else {
                    info!("stored session is past its TTL, forcing re-login");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to read session file, forcing re-login"),
        }
        session
    }

    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let store = self.cookie_store.lock().unwrap();
        let persisted =
            PersistedSession::from_cookie_store(&store, &self.user_agent, self.highest_seen_spot_id)?;
        persisted.save(path)?;
        Ok(())
    }

    /// Performs the login POST. On success transitions to `Authenticated`.
    async fn login_once(&mut self) -> Result<(), SessionError> {
        let url = format!("{}/login", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[("user", self.username.as_str()), ("password", self.password.as_str())])
            .send()
            .await?;

        if response.status().is_success() {
            self.status = SessionStatus::Authenticated;
            Ok(())
        } else {
            Err(SessionError::UnexpectedResponse)
        }
    }

    /// Re-logs in, raising [`SessionError::FatalCredentials`] after three
    /// consecutive failures.
    pub async fn login(&mut self) -> Result<(), SessionError> {
        let mut last_err = None;
        for attempt in 1..=MAX_RELOGIN_ATTEMPTS {
            match self.login_once().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, error = %e, "login attempt failed");
                    last_err = Some(e);
                }
            }
        }
        let _ = last_err;
        self.status = SessionStatus::Unauthenticated;
        Err(SessionError::FatalCredentials)
    }

    /// Fetches spots with `id > since_id`. The "since" filter is
    /// best-effort upstream; duplicates are expected and must be filtered
    /// client-side by the caller.
    pub async fn fetch_recent_spots(&mut self, since_id: u64) -> Result<Vec<Spot>, SessionError> {
        if self.status != SessionStatus::Authenticated {
            self.login().await?;
        }

        let url = format!("{}/drupal/wsprnet/spots/json?since_id={since_id}", self.base_url);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FOUND => {
                self.status = SessionStatus::Expired;
                self.login().await?;
                return Box::pin(self.fetch_recent_spots(since_id)).await;
            }
            status if !status.is_success() => return Err(SessionError::UnexpectedResponse),
            _ => {}
        }

        let body = response.text().await?;
        let spots: Vec<Spot> = match serde_json::from_str(&body) {
            Ok(spots) => spots,
            Err(_) => {
                // An expired session is redirected to an HTML login page
                // rather than a JSON body; treat any parse failure as
                // expiry rather than propagating the serde error.
                self.status = SessionStatus::Expired;
                self.login().await?;
                return Box::pin(self.fetch_recent_spots(since_id)).await;
            }
        };
        if let Some(max_id) = spots.iter().map(|s| s.id).max() {
            self.highest_seen_spot_id = self.highest_seen_spot_id.max(max_id);
        }
        Ok(spots)
    }

    /// Explicit logout, not normally used.
    pub fn logout(&mut self) {
        self.status = SessionStatus::Unauthenticated;
        *self.cookie_store.lock().unwrap() = CookieStore::default();
    }
}

/// Default session file path if the caller doesn't override it via config.
pub fn default_session_path() -> PathBuf {
    PathBuf::from("./session.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_unauthenticated() {
        let session = AggregatorSession::new("http://example.invalid", "user", "pass");
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert_eq!(session.highest_seen_spot_id, 0);
    }

    #[test]
    fn logout_resets_to_unauthenticated() {
        let mut session = AggregatorSession::new("http://example.invalid", "user", "pass");
        session.status = SessionStatus::Authenticated;
        session.logout();
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }
}
