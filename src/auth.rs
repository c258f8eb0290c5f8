//! Login gate: one shared credential pair and a registry of live sessions.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use subtle::ConstantTimeEq;
use tracing::{error, info};
use uuid::Uuid;

/// Constant-time string comparison to prevent timing attacks
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// The configured username/password pair
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        // Evaluate both so a wrong username costs the same as a wrong password
        let user_ok = constant_time_compare(&self.username, username);
        let pass_ok = constant_time_compare(&self.password, password);
        user_ok & pass_ok
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An authenticated browser session.
///
/// Only [`SessionRegistry`] hands these out, so holding one means the login
/// gate was passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct SessionRegistry {
    credentials: Credentials,
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(credentials: Credentials, ttl: Duration) -> Self {
        Self {
            credentials,
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session if the credentials match
    pub fn login(&self, username: &str, password: &str) -> Option<Session> {
        if !self.credentials.verify(username, password) {
            info!("Rejected login attempt for '{}'", username);
            return None;
        }

        let Some(expires_at) = Utc::now().checked_add_signed(self.ttl) else {
            error!("Session lifetime {} is out of range, refusing login", self.ttl);
            return None;
        };

        let session = Session {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            expires_at,
        };

        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(session.id.clone(), session.clone());
        info!("Session started for '{}'", username);

        Some(session)
    }

    /// Look up a live session, dropping any that have expired
    pub fn authorize(&self, id: &str) -> Option<Session> {
        self.authorize_at(id, Utc::now())
    }

    fn authorize_at(&self, id: &str, now: DateTime<Utc>) -> Option<Session> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, session| !session.is_expired_at(now));
        sessions.get(id).cloned()
    }

    /// End a session; returns whether it existed
    pub fn logout(&self, id: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(id).is_some()
    }
}
