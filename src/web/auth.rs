//! Browser sessions.
//!
//! A cookie token maps to the provider session and the `SessionBridge` of
//! that browser. Provider events are fanned out to every session of the
//! affected user.

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::auth::{AuthEvent, AuthSession, SessionBridge};

const COOKIE_NAME: &str = "futsal_session";
const SESSION_TTL_SECS: i64 = 86400;

#[derive(Clone)]
pub struct WebSession {
    pub auth: AuthSession,
    pub bridge: Arc<SessionBridge>,
    pub expires_at: DateTime<Utc>,
}

impl WebSession {
    pub fn new(auth: AuthSession, bridge: SessionBridge) -> Self {
        Self {
            auth,
            bridge: Arc::new(bridge),
            expires_at: Utc::now() + Duration::seconds(SESSION_TTL_SECS),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Maps session tokens to browser sessions
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, WebSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session and return its cookie token
    pub async fn create_session(&self, session: WebSession) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    /// Session by token; expired sessions are treated as missing
    pub async fn get_session(&self, token: &str) -> Option<WebSession> {
        self.sessions
            .read()
            .await
            .get(token)
            .filter(|s| !s.is_expired())
            .cloned()
    }

    pub async fn remove_session(&self, token: &str) -> Option<WebSession> {
        self.sessions.write().await.remove(token)
    }

    /// Swap in refreshed provider tokens
    pub async fn update_auth(&self, token: &str, auth: AuthSession) {
        if let Some(session) = self.sessions.write().await.get_mut(token) {
            session.auth = auth;
        }
    }

    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn of_user(sessions: &HashMap<String, WebSession>, user_id: &str) -> Vec<WebSession> {
        sessions
            .values()
            .filter(|s| s.auth.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Re-read the profile in every session of `user_id`
    pub async fn reload_user(&self, user_id: &str) {
        let targets = Self::of_user(&*self.sessions.read().await, user_id);
        for session in targets {
            session.bridge.reload().await;
        }
    }

    /// End every session of a deleted user
    pub async fn drop_user(&self, user_id: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| {
            let keep = s.auth.user_id != user_id;
            if !keep {
                s.bridge.clear();
            }
            keep
        });
    }

    /// Apply a provider event to the sessions it concerns.
    ///
    /// The session that caused a sign-in or refresh already holds the new
    /// tokens and is skipped. A sign-out ends all sessions of the user.
    pub async fn route_event(&self, event: &AuthEvent) {
        match event {
            AuthEvent::SignedIn(auth) | AuthEvent::TokenRefreshed(auth) => {
                let targets: Vec<WebSession> = Self::of_user(&*self.sessions.read().await, &auth.user_id)
                    .into_iter()
                    .filter(|s| s.auth.access_token != auth.access_token)
                    .collect();
                debug!(
                    "Routing auth event for {} to {} other sessions",
                    auth.user_id,
                    targets.len()
                );
                for session in targets {
                    session.bridge.apply(event).await;
                }
            }
            AuthEvent::SignedOut { user_id } => {
                let mut sessions = self.sessions.write().await;
                let before = sessions.len();
                sessions.retain(|_, s| {
                    let keep = s.auth.user_id != *user_id;
                    if !keep {
                        s.bridge.clear();
                    }
                    keep
                });
                if before > sessions.len() {
                    info!(
                        "Ended {} sessions of signed-out user {}",
                        before - sessions.len(),
                        user_id
                    );
                }
            }
        }
    }
}

pub type SharedSessionStore = Arc<SessionStore>;

pub fn create_session_store() -> SharedSessionStore {
    Arc::new(SessionStore::new())
}

/// Extract session token from cookies
pub fn get_session_token(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{}=", COOKIE_NAME);
    headers
        .get(axum::http::header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|cookie| cookie.trim().strip_prefix(prefix.as_str()).map(str::to_string))
        .filter(|token| !token.is_empty())
}

pub fn create_session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        COOKIE_NAME, token, SESSION_TTL_SECS
    )
}

/// Create a logout cookie (clears the session)
pub fn create_logout_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", COOKIE_NAME)
}
