//! Supabase auth (GoTrue) over its REST API.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{AuthEvent, AuthProvider, AuthSession, EVENT_CAPACITY};
use crate::config::SupabaseConfig;
use crate::error::{AppError, Result};

pub struct GoTrueAuth {
    http: Client,
    auth_url: String,
    api_key: String,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: GoTrueUser,
}

/// `/signup` answers with a session when e-mail confirmation is off and
/// with the bare user otherwise
#[derive(Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    user: Option<GoTrueUser>,
}

/// Both error shapes GoTrue has used
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl GoTrueAuth {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            http,
            auth_url: config.auth_url(),
            api_key: config.anon_key.clone(),
            events,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.auth_url, path))
            .header("apikey", &self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .msg
            .or(body.error_description)
            .or(body.message)
            .unwrap_or_else(|| status.to_string());
        warn!("Auth request failed with {}: {}", status, message);

        if status.is_client_error() {
            Err(AppError::Auth {
                message: auth_message(&message),
            })
        } else {
            Err(AppError::Store {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn token(&self, grant_type: &str, body: serde_json::Value) -> Result<AuthSession> {
        let response = self
            .send(
                self.request(Method::POST, "token")
                    .query(&[("grant_type", grant_type)])
                    .json(&body),
            )
            .await?;
        let token: TokenResponse = response.json().await?;
        Ok(AuthSession {
            email: token.user.email.unwrap_or_default(),
            user_id: token.user.id,
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }

    fn publish(&self, event: AuthEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }
}

/// Translate the provider's English messages the login form shows most often
fn auth_message(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("invalid login credentials") {
        "メールアドレスまたはパスワードが正しくありません。".to_string()
    } else if lower.contains("already registered") {
        "このメールアドレスは既に登録されています。".to_string()
    } else if lower.contains("password should be at least") {
        format!(
            "パスワードは{}文字以上で入力してください。",
            super::MIN_PASSWORD_LEN
        )
    } else if raw.is_empty() {
        "認証エラーが発生しました。".to_string()
    } else {
        raw.to_string()
    }
}

#[async_trait]
impl AuthProvider for GoTrueAuth {
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<String> {
        let response = self
            .send(self.request(Method::POST, "signup").json(&json!({
                "email": email,
                "password": password,
                "data": { "full_name": name },
            })))
            .await?;
        let body: SignUpResponse = response.json().await?;
        let user_id = body
            .user
            .map(|u| u.id)
            .or(body.id)
            .ok_or_else(|| AppError::Decode {
                endpoint: "/auth/v1/signup".to_string(),
                message: "response carries no user id".to_string(),
            })?;
        info!("Registered auth account {} for {}", user_id, email);
        Ok(user_id)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let session = self
            .token("password", json!({ "email": email, "password": password }))
            .await?;
        info!("User {} signed in", session.user_id);
        self.publish(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<()> {
        let result = self
            .send(
                self.request(Method::POST, "logout")
                    .bearer_auth(&session.access_token),
            )
            .await;
        // the local session ends either way
        if let Err(e) = &result {
            warn!("Remote logout for {} failed: {}", session.user_id, e);
        }
        self.publish(AuthEvent::SignedOut {
            user_id: session.user_id.clone(),
        });
        result.map(|_| ())
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession> {
        let refreshed = self
            .token(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token }),
            )
            .await?;
        self.publish(AuthEvent::TokenRefreshed(refreshed.clone()));
        Ok(refreshed)
    }

    async fn update_password(&self, session: &AuthSession, new_password: &str) -> Result<()> {
        self.send(
            self.request(Method::PUT, "user")
                .bearer_auth(&session.access_token)
                .json(&json!({ "password": new_password })),
        )
        .await?;
        info!("Password updated for {}", session.user_id);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
