//! Authentication: the hosted auth provider and the per-session bridge that
//! maps provider sessions onto team profiles.

mod gotrue;
mod memory;
pub mod session;

pub use gotrue::GoTrueAuth;
pub use memory::MemoryAuth;
pub use session::{route_for, subscribe, Route, SessionBridge, SessionState, Subscription};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::Result;

/// Tokens issued by the auth provider for one signed-in user
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// True when the access token expires within `margin_secs`
    pub fn expires_within(&self, margin_secs: i64) -> bool {
        self.expires_at <= Utc::now() + chrono::Duration::seconds(margin_secs)
    }
}

/// Session-change notification pushed by the provider
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut { user_id: String },
}

impl AuthEvent {
    pub fn user_id(&self) -> &str {
        match self {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => &session.user_id,
            AuthEvent::SignedOut { user_id } => user_id,
        }
    }
}

/// Email + password auth provider.
///
/// Every successful sign-in, refresh and sign-out is also broadcast to
/// `subscribe()` receivers.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Register an account and return the new user id
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<String>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn sign_out(&self, session: &AuthSession) -> Result<()>;

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession>;

    async fn update_password(&self, session: &AuthSession, new_password: &str) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

pub type SharedAuthProvider = Arc<dyn AuthProvider>;

/// Capacity of the provider's event channel
pub(crate) const EVENT_CAPACITY: usize = 64;

/// Minimum password length accepted by the hosted provider
pub const MIN_PASSWORD_LEN: usize = 6;
