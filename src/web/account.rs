//! Login, sign-up, logout and the pending-approval screen.

use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::access::{current_session, require_signed_in};
use super::auth::{create_logout_cookie, create_session_cookie, WebSession};
use super::pages::{banner, error_redirect, html_escape, layout, Nav};
use super::server::AppState;
use crate::auth::{route_for, AuthEvent, Route, SessionBridge};

#[derive(Deserialize)]
pub struct FlashParams {
    pub msg: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct SignUpForm {
    name: String,
    email: String,
    password: String,
}

/// GET / - send the session where its state allows
pub async fn index(headers: HeaderMap, State(state): State<AppState>) -> Redirect {
    let route = match current_session(&headers, &state).await {
        Some((_, session)) => route_for(&session.bridge.state()),
        None => Route::Login,
    };
    match route {
        Route::Login => Redirect::to("/login"),
        Route::PendingApproval => Redirect::to("/pending"),
        Route::Main => Redirect::to("/events"),
    }
}

fn auth_card(title: &str, msg: Option<&str>, form: &str, footer: &str) -> String {
    format!(
        r#"<div class="narrow" style="margin: 3rem auto;">
        <div style="text-align: center; margin-bottom: 2rem;">
            <h1 style="font-size: 2rem; font-weight: 900; color: #2563eb;">Futsal Connect</h1>
            <p class="muted">チームのスケジュールと出欠をまとめて管理</p>
        </div>
        <div class="card">
            <h2>{}</h2>
            {}
            {}
        </div>
        <p class="muted" style="text-align: center;">{}</p>
    </div>"#,
        title,
        banner(msg),
        form,
        footer
    )
}

/// GET /login
pub async fn login_page(Query(params): Query<FlashParams>) -> Html<String> {
    let form = r#"<form class="stack" method="post" action="/login">
            <label>メールアドレス<input type="email" name="email" required></label>
            <label>パスワード<input type="password" name="password" required></label>
            <button type="submit">ログイン</button>
        </form>"#;
    Html(layout(
        "ログイン",
        None,
        Nav::None,
        &auth_card(
            "ログイン",
            params.msg.as_deref(),
            form,
            r#"アカウントをお持ちでない方は <a href="/signup">新規登録</a>"#,
        ),
    ))
}

/// POST /login
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let auth = match state.auth.sign_in(form.email.trim(), &form.password).await {
        Ok(auth) => auth,
        Err(e) => return Redirect::to(&error_redirect("/login", &e.user_message())).into_response(),
    };

    let bridge = SessionBridge::new(state.store.clone());
    let session_state = bridge.apply(&AuthEvent::SignedIn(auth.clone())).await;
    let route = route_for(&session_state);
    if route == Route::Login {
        // signed in at the provider but no profile row to go with it
        warn!("Sign-in for {} has no usable profile", auth.user_id);
        return Redirect::to(&error_redirect(
            "/login",
            "プロフィールが見つかりません。管理者に連絡してください。",
        ))
        .into_response();
    }

    let token = state.sessions.create_session(WebSession::new(auth, bridge)).await;
    let target = match route {
        Route::PendingApproval => "/pending",
        _ => "/events",
    };
    (
        [(SET_COOKIE, create_session_cookie(&token))],
        Redirect::to(target),
    )
        .into_response()
}

/// GET /signup
pub async fn signup_page(Query(params): Query<FlashParams>) -> Html<String> {
    let form = r#"<form class="stack" method="post" action="/signup">
            <label>お名前<input type="text" name="name" required></label>
            <label>メールアドレス<input type="email" name="email" required></label>
            <label>パスワード<input type="password" name="password" required minlength="6"></label>
            <button type="submit">登録を申請する</button>
        </form>"#;
    Html(layout(
        "新規登録",
        None,
        Nav::None,
        &auth_card(
            "新規登録",
            params.msg.as_deref(),
            form,
            r#"既にアカウントをお持ちの方は <a href="/login">ログイン</a>"#,
        ),
    ))
}

/// POST /signup - the new member waits for approval
pub async fn signup(State(state): State<AppState>, Form(form): Form<SignUpForm>) -> Response {
    match state
        .members
        .sign_up(&form.name, &form.email, &form.password)
        .await
    {
        Ok(user) => {
            info!("Sign-up submitted by {}", user.email);
            Html(layout(
                "登録申請完了",
                None,
                Nav::None,
                r#"<div class="narrow card" style="margin: 3rem auto; text-align: center;">
            <h2>登録申請完了</h2>
            <p class="muted" style="margin-bottom: 1.5rem;">チーム管理者による承認をお待ちください。<br>
            （メール確認が必要な設定の場合は、メール内のリンクをクリックしてください）</p>
            <a class="button secondary" href="/login">ログイン画面へ</a>
        </div>"#,
            ))
            .into_response()
        }
        Err(e) => Redirect::to(&error_redirect("/signup", &e.user_message())).into_response(),
    }
}

/// GET /logout - end the session here and at the provider
pub async fn logout(headers: HeaderMap, State(state): State<AppState>) -> impl IntoResponse {
    if let Some((token, session)) = current_session(&headers, &state).await {
        state.sessions.remove_session(&token).await;
        session.bridge.clear();
        if let Err(e) = state.auth.sign_out(&session.auth).await {
            warn!("Sign-out at provider failed: {}", e);
        }
    }

    (
        [(SET_COOKIE, create_logout_cookie())],
        Redirect::to("/login"),
    )
}

/// GET /pending - re-reads the profile so an approval shows up on reload
pub async fn pending(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<FlashParams>,
) -> Response {
    let viewer = match require_signed_in(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };
    let user = match route_for(&viewer.session.bridge.reload().await) {
        Route::Main => return Redirect::to("/events").into_response(),
        Route::Login => return Redirect::to("/login").into_response(),
        Route::PendingApproval => viewer.session.bridge.state(),
    };
    let user = match user.user() {
        Some(user) => user.clone(),
        None => return Redirect::to("/login").into_response(),
    };

    let bootstrap = if state.members.bootstrap_available().await {
        r#"<form method="post" action="/pending/bootstrap" style="margin-top: 1.5rem;">
            <p class="muted" style="margin-bottom: 0.5rem;">チームにまだ管理者がいません。</p>
            <button type="submit" class="secondary">自分を管理者として登録する</button>
        </form>"#
    } else {
        ""
    };

    let body = format!(
        r#"<div class="narrow card" style="margin: 3rem auto; text-align: center;">
            {}
            <h2>承認待ちです</h2>
            <p class="muted">{} さん、チーム管理者による承認をお待ちください。<br>承認されるとイベントや出欠が表示されます。</p>
            <p style="margin-top: 1rem;"><a class="button" href="/pending">状態を更新</a>
            <a class="button secondary" href="/logout">ログアウト</a></p>
            {}
        </div>"#,
        banner(params.msg.as_deref()),
        html_escape(&user.name),
        bootstrap
    );
    Html(layout("承認待ち", None, Nav::None, &body)).into_response()
}

/// POST /pending/bootstrap
pub async fn bootstrap(headers: HeaderMap, State(state): State<AppState>) -> Response {
    let viewer = match require_signed_in(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };

    match state.members.bootstrap_admin(&viewer.user).await {
        Ok(user) => {
            viewer.session.bridge.set_user(user);
            Redirect::to("/admin").into_response()
        }
        Err(e) => Redirect::to(&error_redirect("/pending", &e.user_message())).into_response(),
    }
}
