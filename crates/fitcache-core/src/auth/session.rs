use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// ID tokens from the auth provider are valid for one hour.
const TOKEN_EXPIRY_MINUTES: i64 = 60;

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            token: token.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn is_expired(&self) -> bool {
        let expiry = self.created_at + Duration::minutes(TOKEN_EXPIRY_MINUTES);
        Utc::now() > expiry
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        let refresh_at =
            self.created_at + Duration::minutes(TOKEN_EXPIRY_MINUTES - TOKEN_REFRESH_BUFFER_MINUTES);
        Utc::now() > refresh_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        let expiry = self.created_at + Duration::minutes(TOKEN_EXPIRY_MINUTES);
        expiry - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

/// Auth as seen by the store: unknown until the provider reports once.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AuthState {
    #[default]
    Unknown,
    Authenticated(SessionData),
    Anonymous,
}

impl AuthState {
    pub fn from_session(session: Option<SessionData>) -> Self {
        match session {
            Some(data) => AuthState::Authenticated(data),
            None => AuthState::Anonymous,
        }
    }

    /// True until the first auth callback arrives.
    pub fn auth_loading(&self) -> bool {
        matches!(self, AuthState::Unknown)
    }

    pub fn session(&self) -> Option<&SessionData> {
        match self {
            AuthState::Authenticated(data) => Some(data),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session().map(|s| s.user_id.as_str())
    }
}

/// Session persisted between runs of the CLI.
pub struct Session {
    cache_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load session from disk. Expired sessions are ignored.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if path.exists() {
            let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
            let data: SessionData =
                serde_json::from_str(&contents).context("Failed to parse session file")?;

            if !data.is_expired() {
                self.data = Some(data);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.token.as_str())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.user_id.as_str())
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_expired()).unwrap_or(false)
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry() {
        let fresh = SessionData::new("u1", "tok");
        assert!(!fresh.is_expired());
        assert!(!fresh.needs_refresh());
        assert!(fresh.minutes_until_expiry() >= 59);

        let mut stale = SessionData::new("u1", "tok");
        stale.created_at = Utc::now() - Duration::minutes(56);
        assert!(!stale.is_expired());
        assert!(stale.needs_refresh());

        stale.created_at = Utc::now() - Duration::minutes(61);
        assert!(stale.is_expired());
        assert_eq!(stale.minutes_until_expiry(), 0);
    }

    #[test]
    fn test_auth_state_transitions() {
        let state = AuthState::default();
        assert!(state.auth_loading());
        assert_eq!(state.user_id(), None);

        let state = AuthState::from_session(Some(SessionData::new("u1", "tok")));
        assert!(!state.auth_loading());
        assert_eq!(state.user_id(), Some("u1"));

        let state = AuthState::from_session(None);
        assert!(!state.auth_loading());
        assert!(state.session().is_none());
    }

    #[test]
    fn test_session_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        assert!(!session.load().unwrap());

        session.update(SessionData::new("u1", "tok").with_email("a@b.c"));
        session.save().unwrap();

        let mut reloaded = Session::new(dir.path().to_path_buf());
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.user_id(), Some("u1"));
        assert!(reloaded.is_valid());

        reloaded.clear().unwrap();
        let mut again = Session::new(dir.path().to_path_buf());
        assert!(!again.load().unwrap());
    }

    #[test]
    fn test_expired_session_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        let mut data = SessionData::new("u1", "tok");
        data.created_at = Utc::now() - Duration::hours(2);
        session.update(data);
        session.save().unwrap();

        let mut reloaded = Session::new(dir.path().to_path_buf());
        assert!(!reloaded.load().unwrap());
        assert!(reloaded.data.is_none());
    }
}
