//! Per-session auth state machine.
//!
//! A `SessionBridge` holds one browser session's state, `Unauthenticated` or
//! `Authenticated(User)`, and moves between them on provider events. The
//! current state is published through a `watch` channel.

use std::future::Future;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{AuthEvent, AuthProvider};
use crate::gateway::SharedTeamStore;
use crate::models::User;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(User),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            SessionState::Unauthenticated => None,
        }
    }
}

/// Top-level screen a session is allowed to see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    PendingApproval,
    Main,
}

/// Approval gates everything, regardless of role
pub fn route_for(state: &SessionState) -> Route {
    match state {
        SessionState::Unauthenticated => Route::Login,
        SessionState::Authenticated(user) if !user.is_approved => Route::PendingApproval,
        SessionState::Authenticated(_) => Route::Main,
    }
}

pub struct SessionBridge {
    store: SharedTeamStore,
    state: watch::Sender<SessionState>,
}

impl SessionBridge {
    pub fn new(store: SharedTeamStore) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self { store, state }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Apply a provider event and return the resulting state.
    ///
    /// Sign-in and refresh look up the profile; a missing profile or a failed
    /// lookup leaves the session unauthenticated.
    pub async fn apply(&self, event: &AuthEvent) -> SessionState {
        let next = match event {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                self.lookup(&session.user_id).await
            }
            AuthEvent::SignedOut { .. } => SessionState::Unauthenticated,
        };
        self.state.send_replace(next.clone());
        next
    }

    /// Re-read the current user's profile
    pub async fn reload(&self) -> SessionState {
        let user_id = match self.state().user() {
            Some(user) => user.id.clone(),
            None => return SessionState::Unauthenticated,
        };
        let next = self.lookup(&user_id).await;
        self.state.send_replace(next.clone());
        next
    }

    /// Replace the cached profile after a confirmed update
    pub fn set_user(&self, user: User) {
        self.state.send_replace(SessionState::Authenticated(user));
    }

    pub fn clear(&self) {
        self.state.send_replace(SessionState::Unauthenticated);
    }

    async fn lookup(&self, user_id: &str) -> SessionState {
        match self.store.get_profile(user_id).await {
            Ok(Some(user)) => SessionState::Authenticated(user),
            Ok(None) => {
                warn!("No profile for signed-in user {}", user_id);
                SessionState::Unauthenticated
            }
            Err(e) => {
                warn!("Profile lookup for {} failed: {}", user_id, e);
                SessionState::Unauthenticated
            }
        }
    }
}

/// Listener task on the provider's event channel; aborted on drop
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Feed every provider event to `handler` until the subscription is dropped
pub fn subscribe<F, Fut>(provider: &dyn AuthProvider, handler: F) -> Subscription
where
    F: Fn(AuthEvent) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut events = provider.subscribe();
    let handle = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => handler(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Auth listener lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Auth event channel closed");
                    break;
                }
            }
        }
    });
    Subscription { handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthSession, MemoryAuth};
    use crate::gateway::{MemoryStore, TeamStore};
    use crate::models::{NewProfile, Role, UserUpdate};
    use chrono::Utc;
    use std::sync::Arc;

    fn session(user_id: &str) -> AuthSession {
        AuthSession {
            user_id: user_id.to_string(),
            email: format!("{}@example.com", user_id),
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_unapproved_user_routes_to_pending_for_every_role() {
        let store = Arc::new(MemoryStore::new());
        store
            .create_profile(NewProfile::new("u1", "A", "a@example.com"))
            .await
            .unwrap();
        let bridge = SessionBridge::new(store.clone());

        for role in [Role::Member, Role::Admin] {
            store.update_user("u1", &UserUpdate::role(role)).await.unwrap();
            let state = bridge.apply(&AuthEvent::SignedIn(session("u1"))).await;
            assert_eq!(route_for(&state), Route::PendingApproval);
        }

        store.update_user("u1", &UserUpdate::approve()).await.unwrap();
        assert_eq!(route_for(&bridge.reload().await), Route::Main);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_unauthenticated() {
        let store = Arc::new(MemoryStore::with_demo_data(Utc::now().date_naive()));
        let bridge = SessionBridge::new(store.clone());

        let state = bridge.apply(&AuthEvent::SignedIn(session("u1"))).await;
        assert_eq!(route_for(&state), Route::Main);

        store.set_offline(true);
        let state = bridge
            .apply(&AuthEvent::TokenRefreshed(session("u1")))
            .await;
        assert_eq!(state, SessionState::Unauthenticated);

        store.set_offline(false);
        let state = bridge.apply(&AuthEvent::SignedIn(session("nobody"))).await;
        assert_eq!(route_for(&state), Route::Login);
    }

    #[tokio::test]
    async fn test_sign_out_is_observed_by_watchers() {
        let store = Arc::new(MemoryStore::with_demo_data(Utc::now().date_naive()));
        let bridge = SessionBridge::new(store);
        let mut watcher = bridge.watch();

        bridge.apply(&AuthEvent::SignedIn(session("u2"))).await;
        watcher.changed().await.unwrap();
        assert!(watcher.borrow().user().is_some());

        bridge
            .apply(&AuthEvent::SignedOut {
                user_id: "u2".to_string(),
            })
            .await;
        watcher.changed().await.unwrap();
        assert_eq!(*watcher.borrow(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_subscription_delivers_until_dropped() {
        let auth = MemoryAuth::new();
        auth.add_account("u1", "a@example.com", "secret1");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let subscription = subscribe(&auth, move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.user_id().to_string());
            }
        });

        auth.sign_in("a@example.com", "secret1").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("u1"));

        drop(subscription);
        // the task owned the only sender
        assert_eq!(rx.recv().await, None);
    }
}
