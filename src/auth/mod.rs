//! Sessions
//!
//! Mock sign-in for citizens and authorities. Credentials are not verified:
//! any well-formed email with a non-empty password gets a session. Sessions
//! are persisted under `citypulse_sessions` in the record store's backend so
//! they survive restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use uuid::Uuid;

use crate::store::{StorageBackend, StoreError};

/// Storage key of the persisted sessions
pub const SESSIONS_KEY: &str = "citypulse_sessions";

/// Session layer errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Password must not be empty")]
    EmptyPassword,

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Session lock poisoned")]
    Lock,
}

/// Kind of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Citizen,
    Authority,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Citizen => write!(f, "citizen"),
            UserRole::Authority => write!(f, "authority"),
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "citizen" => Ok(UserRole::Citizen),
            "authority" => Ok(UserRole::Authority),
            _ => Err(format!("Invalid role: {}. Use citizen or authority", s)),
        }
    }
}

/// Signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(rename = "type")]
    pub role: UserRole,
    pub name: String,
}

impl User {
    pub fn can_submit_reports(&self) -> bool {
        self.role == UserRole::Citizen
    }

    pub fn can_update_status(&self) -> bool {
        self.role == UserRole::Authority
    }

    pub fn can_publish_alerts(&self) -> bool {
        self.role == UserRole::Authority
    }

    /// Whether this user may see a report submitted by `owner_id`
    pub fn can_view_report_of(&self, owner_id: &str) -> bool {
        self.role == UserRole::Authority || self.id == owner_id
    }
}

/// Bearer session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: User,
    pub created_at: DateTime<Utc>,
}

/// Issues, resolves and revokes sessions
pub struct SessionManager {
    backend: Arc<dyn StorageBackend>,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionManager {
    /// Create a manager, restoring persisted sessions.
    ///
    /// Malformed session data is discarded and its key removed.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let sessions = restore(backend.as_ref());
        tracing::debug!(sessions = sessions.len(), "Sessions restored");

        Self {
            backend,
            sessions: RwLock::new(sessions),
        }
    }

    /// Sign in. Returns a fresh session token.
    ///
    /// Signing in again with the same email and role keeps the user id, so
    /// a citizen sees the same reports across sessions.
    pub fn login(&self, email: &str, password: &str, role: UserRole) -> Result<Session, AuthError> {
        let email = email.trim();
        let Some((local, domain)) = email.split_once('@') else {
            return Err(AuthError::InvalidEmail(email.to_string()));
        };
        if local.is_empty() || domain.is_empty() {
            return Err(AuthError::InvalidEmail(email.to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::EmptyPassword);
        }

        let mut sessions = self.sessions.write().map_err(|_| AuthError::Lock)?;

        let user = match sessions
            .values()
            .find(|s| s.user.email == email && s.user.role == role)
        {
            Some(existing) => existing.user.clone(),
            None => User {
                id: next_user_id(&sessions),
                email: email.to_string(),
                role,
                name: local.to_string(),
            },
        };

        let session = Session {
            token: Uuid::new_v4().to_string(),
            user,
            created_at: Utc::now(),
        };

        sessions.insert(session.token.clone(), session.clone());
        if let Err(e) = self.persist(&sessions) {
            sessions.remove(&session.token);
            return Err(e);
        }

        tracing::info!(user_id = %session.user.id, role = %role, "User signed in");
        Ok(session)
    }

    /// Revoke a session. Returns false when the token was unknown.
    pub fn logout(&self, token: &str) -> Result<bool, AuthError> {
        let mut sessions = self.sessions.write().map_err(|_| AuthError::Lock)?;
        let Some(session) = sessions.remove(token) else {
            return Ok(false);
        };

        self.persist(&sessions)?;
        tracing::info!(user_id = %session.user.id, "User signed out");
        Ok(true)
    }

    /// User behind a token
    pub fn current(&self, token: &str) -> Option<User> {
        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(token).map(|s| s.user.clone()))
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, sessions: &HashMap<String, Session>) -> Result<(), AuthError> {
        let mut list: Vec<&Session> = sessions.values().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let json = serde_json::to_string(&list).map_err(StoreError::from)?;
        self.backend.set(SESSIONS_KEY, &json, None)?;
        Ok(())
    }
}

fn restore(backend: &dyn StorageBackend) -> HashMap<String, Session> {
    let raw = match backend.get(SESSIONS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return HashMap::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Sessions unreadable, starting empty");
            return HashMap::new();
        }
    };

    match serde_json::from_str::<Vec<Session>>(&raw) {
        Ok(list) => list.into_iter().map(|s| (s.token.clone(), s)).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Malformed session data, discarding");
            if let Err(e) = backend.remove(SESSIONS_KEY, None) {
                tracing::warn!(error = %e, "Failed to remove malformed session data");
            }
            HashMap::new()
        }
    }
}

/// Millisecond timestamp id, bumped past ids already in use
fn next_user_id(sessions: &HashMap<String, Session>) -> String {
    let mut millis = Utc::now().timestamp_millis();
    loop {
        let id = millis.to_string();
        if !sessions.values().any(|s| s.user.id == id) {
            return id;
        }
        millis += 1;
    }
}
