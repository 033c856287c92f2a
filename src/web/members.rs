//! Member roster, admin member management and the settings screen.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use super::access::{require_admin, require_member};
use super::account::FlashParams;
use super::pages::{banner, error_redirect, html_escape, layout, notice_redirect, Nav};
use super::server::AppState;
use crate::models::{Role, User, UserUpdate};

#[derive(Deserialize)]
pub struct EditForm {
    name: String,
    email: String,
    #[serde(default)]
    position: String,
    #[serde(default)]
    avatar: String,
    role: String,
    is_approved: Option<String>,
}

#[derive(Deserialize)]
pub struct SettingsForm {
    name: String,
    email: String,
}

#[derive(Deserialize)]
pub struct PasswordForm {
    password: String,
}

fn member_path(user_id: &str, action: &str) -> String {
    format!("/members/{}/{}", urlencoding::encode(user_id), action)
}

fn action_button(user_id: &str, action: &str, label: &str, class: &str) -> String {
    format!(
        r#"<form class="inline" method="post" action="{}"><button type="submit" class="small {}">{}</button></form>"#,
        member_path(user_id, action),
        class,
        label
    )
}

/// GET /members
pub async fn roster(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<FlashParams>,
) -> Response {
    let viewer = match require_member(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };
    if let Err(e) = state.team.ensure_loaded().await {
        return Redirect::to(&error_redirect("/events", &e.user_message())).into_response();
    }

    let users = state.team.cache().read().await.users();
    let is_admin = viewer.user.is_admin();

    let pending_section = if is_admin {
        let pending: Vec<&User> = users.iter().filter(|u| !u.is_approved).collect();
        if pending.is_empty() {
            String::new()
        } else {
            let rows: String = pending
                .iter()
                .map(|u| {
                    format!(
                        r#"<tr><td>{}</td><td class="muted">{}</td><td>{} {}</td></tr>"#,
                        html_escape(&u.name),
                        html_escape(&u.email),
                        action_button(&u.id, "approve", "承認", ""),
                        action_button(&u.id, "reject", "却下", "danger")
                    )
                })
                .collect();
            format!(
                r#"<h3 style="margin-bottom: 0.75rem;">承認待ち ({})</h3>
        <table style="margin-bottom: 2rem;"><thead><tr><th>名前</th><th>メール</th><th></th></tr></thead><tbody>{}</tbody></table>"#,
                pending.len(),
                rows
            )
        }
    } else {
        String::new()
    };

    let rows: String = users
        .iter()
        .filter(|u| u.is_approved)
        .map(|u| {
            let mut badges = String::new();
            if u.is_admin() {
                badges.push_str(r#" <span class="badge admin">ADMIN</span>"#);
            }
            if u.id == viewer.user.id {
                badges.push_str(r#" <span class="badge self">自分</span>"#);
            }
            let actions = if is_admin {
                let mut actions = format!(
                    r#"<a class="button secondary small" href="{}">編集</a> {}"#,
                    member_path(&u.id, "edit"),
                    action_button(
                        &u.id,
                        "role",
                        if u.is_admin() { "メンバーにする" } else { "管理者にする" },
                        "secondary"
                    )
                );
                if u.id != viewer.user.id {
                    actions.push(' ');
                    actions.push_str(&action_button(&u.id, "delete", "削除", "danger"));
                }
                actions
            } else {
                String::new()
            };
            format!(
                r#"<tr><td><img class="avatar" src="{}" alt=""> {}{}</td><td class="muted">{}</td><td>{}</td></tr>"#,
                html_escape(&u.avatar_url()),
                html_escape(&u.name),
                badges,
                html_escape(u.position.as_deref().unwrap_or("-")),
                actions
            )
        })
        .collect();

    let body = format!(
        r#"{}
        {}
        <h2>メンバー</h2>
        <table><thead><tr><th>名前</th><th>ポジション</th><th></th></tr></thead><tbody>{}</tbody></table>"#,
        banner(params.msg.as_deref()),
        pending_section,
        rows
    );
    Html(layout("メンバー", Some(&viewer.user), Nav::Members, &body)).into_response()
}

/// POST /members/:id/approve
pub async fn approve(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    let viewer = match require_admin(&headers, &state).await {
        Ok(v) => v,
        Err(response) => return response,
    };
    match state.members.approve(&viewer.user, &user_id).await {
        Ok(()) => {
            state.sessions.reload_user(&user_id).await;
            Redirect::to(&notice_redirect("/members", "承認しました")).into_response()
        }
        Err(e) => Redirect::to(&error_redirect("/members", &e.user_message())).into_response(),
    }
}

/// POST /members/:id/reject
pub async fn reject(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    let viewer = match require_admin(&headers, &state).await {
        Ok(v) => v,
        Err(response) => return response,
    };
    match state.members.reject(&viewer.user, &user_id).await {
        Ok(()) => {
            state.sessions.drop_user(&user_id).await;
            Redirect::to(&notice_redirect("/members", "登録申請を却下しました")).into_response()
        }
        Err(e) => Redirect::to(&error_redirect("/members", &e.user_message())).into_response(),
    }
}

/// POST /members/:id/delete
pub async fn delete(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    let viewer = match require_admin(&headers, &state).await {
        Ok(v) => v,
        Err(response) => return response,
    };
    match state.members.delete(&viewer.user, &user_id).await {
        Ok(()) => {
            state.sessions.drop_user(&user_id).await;
            Redirect::to(&notice_redirect("/members", "メンバーを削除しました")).into_response()
        }
        Err(e) => Redirect::to(&error_redirect("/members", &e.user_message())).into_response(),
    }
}

/// POST /members/:id/role
pub async fn toggle_role(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    let viewer = match require_admin(&headers, &state).await {
        Ok(v) => v,
        Err(response) => return response,
    };
    match state.members.toggle_role(&viewer.user, &user_id).await {
        Ok(user) => {
            state.sessions.reload_user(&user_id).await;
            let message = format!("{} の権限を {} に変更しました", user.name, user.role.as_str());
            Redirect::to(&notice_redirect("/members", &message)).into_response()
        }
        Err(e) => Redirect::to(&error_redirect("/members", &e.user_message())).into_response(),
    }
}

/// GET /members/:id/edit
pub async fn edit_form(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<FlashParams>,
) -> Response {
    let viewer = match require_admin(&headers, &state).await {
        Ok(v) => v,
        Err(response) => return response,
    };
    let user = match state.team.cache().read().await.user(&user_id).cloned() {
        Some(user) => user,
        None => {
            return Redirect::to(&error_redirect("/members", "メンバーが見つかりません"))
                .into_response()
        }
    };

    let role_option = |role: Role| {
        format!(
            r#"<option value="{}"{}>{}</option>"#,
            role.as_str(),
            if user.role == role { " selected" } else { "" },
            role.as_str()
        )
    };

    let body = format!(
        r#"<div class="card" style="max-width: 640px;">
            <h2>メンバー編集</h2>
            {}
            <form class="stack" method="post" action="{}">
                <label>名前<input type="text" name="name" value="{}" required></label>
                <label>メールアドレス<input type="email" name="email" value="{}" required></label>
                <label>ポジション<input type="text" name="position" value="{}" placeholder="ALA / PIVO / FIXO / GOLEIRO"></label>
                <label>アバターURL<input type="url" name="avatar" value="{}"></label>
                <label>権限<select name="role">{}{}</select></label>
                <label><input type="checkbox" name="is_approved" value="on"{} style="width: auto;"> 承認済み</label>
                <div><button type="submit">保存する</button> <a class="button secondary" href="/members">キャンセル</a></div>
            </form>
        </div>"#,
        banner(params.msg.as_deref()),
        member_path(&user.id, "edit"),
        html_escape(&user.name),
        html_escape(&user.email),
        html_escape(user.position.as_deref().unwrap_or("")),
        html_escape(user.avatar.as_deref().unwrap_or("")),
        role_option(Role::Member),
        role_option(Role::Admin),
        if user.is_approved { " checked" } else { "" }
    );
    Html(layout("メンバー編集", Some(&viewer.user), Nav::Members, &body)).into_response()
}

/// POST /members/:id/edit
pub async fn save_edit(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Form(form): Form<EditForm>,
) -> Response {
    let viewer = match require_admin(&headers, &state).await {
        Ok(v) => v,
        Err(response) => return response,
    };
    let back = member_path(&user_id, "edit");
    let role = match form.role.parse::<Role>() {
        Ok(role) => role,
        Err(_) => return Redirect::to(&error_redirect(&back, "権限を選択してください")).into_response(),
    };

    let update = UserUpdate {
        name: Some(form.name),
        email: Some(form.email),
        role: Some(role),
        position: Some(form.position),
        avatar: Some(form.avatar),
        is_approved: Some(form.is_approved.is_some()),
    };
    match state.members.update_user(&viewer.user, &user_id, update).await {
        Ok(_) => {
            state.sessions.reload_user(&user_id).await;
            Redirect::to(&notice_redirect("/members", "保存しました")).into_response()
        }
        Err(e) => Redirect::to(&error_redirect(&back, &e.user_message())).into_response(),
    }
}

/// GET /settings
pub async fn settings(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<FlashParams>,
) -> Response {
    let viewer = match require_member(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };

    let body = format!(
        r#"{}
        <div class="card" style="max-width: 640px;">
            <h2>プロフィール</h2>
            <form class="stack" method="post" action="/settings/profile">
                <label>名前<input type="text" name="name" value="{}" required></label>
                <label>メールアドレス<input type="email" name="email" value="{}" required></label>
                <div><button type="submit">保存する</button></div>
            </form>
        </div>
        <div class="card" style="max-width: 640px;">
            <h2>パスワード変更</h2>
            <form class="stack" method="post" action="/settings/password">
                <label>新しいパスワード<input type="password" name="password" required minlength="6"></label>
                <div><button type="submit">変更する</button></div>
            </form>
        </div>
        <a class="button secondary" href="/logout">ログアウト</a>"#,
        banner(params.msg.as_deref()),
        html_escape(&viewer.user.name),
        html_escape(&viewer.user.email)
    );
    Html(layout("設定", Some(&viewer.user), Nav::Settings, &body)).into_response()
}

/// POST /settings/profile
pub async fn save_settings(
    headers: HeaderMap,
    State(state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Response {
    let viewer = match require_member(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };
    match state
        .members
        .update_settings(&viewer.user, &form.name, &form.email)
        .await
    {
        Ok(user) => {
            viewer.session.bridge.set_user(user);
            state.sessions.reload_user(&viewer.user.id).await;
            Redirect::to(&notice_redirect("/settings", "保存しました")).into_response()
        }
        Err(e) => Redirect::to(&error_redirect("/settings", &e.user_message())).into_response(),
    }
}

/// POST /settings/password
pub async fn change_password(
    headers: HeaderMap,
    State(state): State<AppState>,
    Form(form): Form<PasswordForm>,
) -> Response {
    let viewer = match require_member(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };
    match state
        .members
        .change_password(&viewer.user, &viewer.session.auth, &form.password)
        .await
    {
        Ok(()) => Redirect::to(&notice_redirect("/settings", "パスワードを変更しました")).into_response(),
        Err(e) => Redirect::to(&error_redirect("/settings", &e.user_message())).into_response(),
    }
}
