//! Request guards: resolve the browser session and route it by state.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use tracing::warn;

use super::auth::{get_session_token, WebSession};
use super::pages::{layout, Nav};
use super::server::AppState;
use crate::auth::{route_for, Route, SessionState};
use crate::managers::permission_checker;
use crate::models::User;

/// Seconds before expiry at which provider tokens are refreshed
const REFRESH_MARGIN_SECS: i64 = 60;

/// A signed-in browser session
pub struct Viewer {
    pub token: String,
    pub session: WebSession,
    pub user: User,
}

/// Session by cookie, with provider tokens refreshed when they are about to
/// expire. A failed refresh ends the session.
pub async fn current_session(
    headers: &HeaderMap,
    state: &AppState,
) -> Option<(String, WebSession)> {
    let token = get_session_token(headers)?;
    let mut session = state.sessions.get_session(&token).await?;

    if session.auth.expires_within(REFRESH_MARGIN_SECS) {
        match state.auth.refresh(&session.auth).await {
            Ok(refreshed) => {
                state.sessions.update_auth(&token, refreshed.clone()).await;
                session.auth = refreshed;
            }
            Err(e) => {
                warn!("Token refresh for {} failed: {}", session.auth.user_id, e);
                state.sessions.remove_session(&token).await;
                return None;
            }
        }
    }
    Some((token, session))
}

/// Signed in, any approval state
pub async fn require_signed_in(headers: &HeaderMap, state: &AppState) -> Result<Viewer, Response> {
    let (token, session) = current_session(headers, state)
        .await
        .ok_or_else(|| Redirect::to("/login").into_response())?;

    match session.bridge.state() {
        SessionState::Authenticated(user) => Ok(Viewer {
            token,
            session,
            user,
        }),
        SessionState::Unauthenticated => Err(Redirect::to("/login").into_response()),
    }
}

/// Approved member; pending users are sent to the pending screen
pub async fn require_member(headers: &HeaderMap, state: &AppState) -> Result<Viewer, Response> {
    let viewer = require_signed_in(headers, state).await?;
    match route_for(&SessionState::Authenticated(viewer.user.clone())) {
        Route::Main => Ok(viewer),
        Route::PendingApproval => Err(Redirect::to("/pending").into_response()),
        Route::Login => Err(Redirect::to("/login").into_response()),
    }
}

pub async fn require_admin(headers: &HeaderMap, state: &AppState) -> Result<Viewer, Response> {
    let viewer = require_member(headers, state).await?;
    if permission_checker::require_admin(&viewer.user).is_err() {
        return Err(forbidden(&viewer.user));
    }
    Ok(viewer)
}

pub fn forbidden(user: &User) -> Response {
    (
        StatusCode::FORBIDDEN,
        Html(layout(
            "権限がありません",
            Some(user),
            Nav::None,
            r#"<div class="card"><h2>権限がありません</h2>
            <p class="muted">この画面は管理者のみ利用できます。</p>
            <p style="margin-top: 1rem;"><a href="/events">イベント一覧へ戻る</a></p></div>"#,
        )),
    )
        .into_response()
}
