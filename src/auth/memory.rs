use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::info;

use super::{AuthEvent, AuthProvider, AuthSession, EVENT_CAPACITY, MIN_PASSWORD_LEN};
use crate::error::{AppError, Result};

/// Access token lifetime handed out by the in-process provider
const TOKEN_TTL_SECS: i64 = 3600;

struct Account {
    user_id: String,
    password: String,
}

/// In-process auth provider for demo mode and tests
pub struct MemoryAuth {
    /// Keyed by lowercased email
    accounts: DashMap<String, Account>,
    /// refresh token -> (user id, email)
    refresh_tokens: DashMap<String, (String, String)>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            accounts: DashMap::new(),
            refresh_tokens: DashMap::new(),
            events,
        }
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account for an existing profile id
    pub fn add_account(&self, user_id: &str, email: &str, password: &str) {
        self.accounts.insert(
            email.trim().to_lowercase(),
            Account {
                user_id: user_id.to_string(),
                password: password.to_string(),
            },
        );
    }

    fn issue(&self, user_id: &str, email: &str) -> AuthSession {
        let refresh_token = uuid::Uuid::new_v4().to_string();
        self.refresh_tokens.insert(
            refresh_token.clone(),
            (user_id.to_string(), email.to_string()),
        );
        AuthSession {
            user_id: user_id.to_string(),
            email: email.to_string(),
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(TOKEN_TTL_SECS),
        }
    }

    fn publish(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

fn auth_error(message: &str) -> AppError {
    AppError::Auth {
        message: message.to_string(),
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_up(&self, _name: &str, email: &str, password: &str) -> Result<String> {
        let key = email.trim().to_lowercase();
        if key.is_empty() {
            return Err(auth_error("メールアドレスを入力してください。"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Auth {
                message: format!(
                    "パスワードは{}文字以上で入力してください。",
                    MIN_PASSWORD_LEN
                ),
            });
        }
        if self.accounts.contains_key(&key) {
            return Err(auth_error("このメールアドレスは既に登録されています。"));
        }

        let user_id = uuid::Uuid::new_v4().to_string();
        self.add_account(&user_id, &key, password);
        info!("Registered auth account {} for {}", user_id, key);
        Ok(user_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let key = email.trim().to_lowercase();
        let user_id = match self.accounts.get(&key) {
            Some(account) if account.password == password => account.user_id.clone(),
            _ => {
                return Err(auth_error(
                    "メールアドレスまたはパスワードが正しくありません。",
                ))
            }
        };
        let session = self.issue(&user_id, &key);
        self.publish(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<()> {
        // global scope: every refresh token of the user is revoked
        self.refresh_tokens
            .retain(|_, (user_id, _)| *user_id != session.user_id);
        self.publish(AuthEvent::SignedOut {
            user_id: session.user_id.clone(),
        });
        Ok(())
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession> {
        let (user_id, email) = self
            .refresh_tokens
            .remove(&session.refresh_token)
            .map(|(_, owner)| owner)
            .ok_or_else(|| auth_error("セッションの有効期限が切れました。再度ログインしてください。"))?;
        let refreshed = self.issue(&user_id, &email);
        self.publish(AuthEvent::TokenRefreshed(refreshed.clone()));
        Ok(refreshed)
    }

    async fn update_password(&self, session: &AuthSession, new_password: &str) -> Result<()> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Auth {
                message: format!(
                    "パスワードは{}文字以上で入力してください。",
                    MIN_PASSWORD_LEN
                ),
            });
        }
        let mut account = self
            .accounts
            .iter_mut()
            .find(|entry| entry.user_id == session.user_id)
            .ok_or_else(|| auth_error("アカウントが見つかりません。"))?;
        account.password = new_password.to_string();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
