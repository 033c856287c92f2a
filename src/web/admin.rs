//! Admin panel routes and handlers
//!
//! Team overview with a manual reload, plus the live log viewer.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Redirect, Response,
    },
    routing::{get, post},
    Router,
};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::info;

use super::access::require_admin;
use super::account::FlashParams;
use super::pages::{banner, error_redirect, html_escape, layout, notice_redirect, Nav};
use super::server::AppState;

/// Entries rendered before the live stream takes over
const LOG_BACKLOG: usize = 100;

const LOG_STYLE: &str = r#"<style>
        .log-container {
            background: #0f172a; color: #e2e8f0; border-radius: 12px; padding: 1rem;
            font-family: 'SF Mono', 'Fira Code', monospace; font-size: 0.8rem;
            height: calc(100vh - 260px); overflow-y: auto;
        }
        .log-entry { padding: 0.2rem 0; border-bottom: 1px solid #1e293b; white-space: pre-wrap; word-break: break-all; }
        .log-entry .time { color: #64748b; }
        .log-entry .level { font-weight: bold; }
        .log-entry .target { color: #94a3b8; }
        .log-entry.error, .log-entry.error .level { color: #f87171; }
        .log-entry.warn, .log-entry.warn .level { color: #fbbf24; }
        .log-entry.info .level { color: #60a5fa; }
        .log-entry.debug { color: #94a3b8; }
        #live-indicator { display: inline-block; width: 8px; height: 8px; background: #22c55e; border-radius: 50%; margin-right: 0.5rem; }
        #live-indicator.disconnected { background: #ef4444; }
    </style>"#;

pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/refresh", post(refresh))
        .route("/logs", get(logs_page))
        .route("/logs/stream", get(logs_stream))
        .with_state(state)
}

/// GET /admin
async fn dashboard(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<FlashParams>,
) -> Response {
    let viewer = match require_admin(&headers, &state).await {
        Ok(v) => v,
        Err(response) => return response,
    };

    let (stats, users, events, pending, loaded_at) = {
        let cache = state.team.cache().read().await;
        (
            cache.stats(),
            cache.user_count(),
            cache.event_count(),
            cache.pending_users().len(),
            cache.loaded_at(),
        )
    };
    let sessions = state.sessions.len().await;
    let loaded = match loaded_at {
        Some(at) => at
            .with_timezone(&chrono::Local)
            .format("%Y/%m/%d %H:%M:%S")
            .to_string(),
        None => "未読込".to_string(),
    };

    let body = format!(
        r#"{banner}
        <h2>チーム管理</h2>
        <div class="cards">
            <div class="card"><div class="muted">イベント数</div><div class="value">{total_events}</div></div>
            <div class="card"><div class="muted">アクティブメンバー</div><div class="value">{active}</div></div>
            <div class="card"><div class="muted">平均出席人数</div><div class="value">{average:.1}</div></div>
            <div class="card"><div class="muted">承認待ち</div><div class="value">{pending}</div>
                <a href="/members">メンバー管理へ</a></div>
        </div>
        <div class="card">
            <p class="muted">登録ユーザー {users} 人 / イベント {events} 件 / ログイン中 {sessions} 件 / 最終読込 {loaded}</p>
            <div style="margin-top: 0.75rem;">
                <form class="inline" method="post" action="/admin/refresh"><button type="submit">データを再読込</button></form>
                <a class="button secondary" href="/admin/logs">ログを見る</a>
            </div>
        </div>"#,
        banner = banner(params.msg.as_deref()),
        total_events = stats.total_events,
        active = stats.active_members,
        average = stats.average_attendance,
        pending = pending,
        users = users,
        events = events,
        sessions = sessions,
        loaded = loaded,
    );
    Html(layout("管理", Some(&viewer.user), Nav::Admin, &body)).into_response()
}

/// POST /admin/refresh - full reload of users and events
async fn refresh(headers: HeaderMap, State(state): State<AppState>) -> Response {
    let viewer = match require_admin(&headers, &state).await {
        Ok(v) => v,
        Err(response) => return response,
    };

    info!("{} requested a reload", viewer.user.name);
    match state.team.refresh().await {
        Ok(true) => Redirect::to(&notice_redirect("/admin", "再読込しました")).into_response(),
        Ok(false) => Redirect::to(&notice_redirect(
            "/admin",
            "読込中に変更があったため、結果を破棄しました",
        ))
        .into_response(),
        Err(e) => Redirect::to(&error_redirect("/admin", &e.user_message())).into_response(),
    }
}

/// GET /admin/logs
async fn logs_page(headers: HeaderMap, State(state): State<AppState>) -> Response {
    let viewer = match require_admin(&headers, &state).await {
        Ok(v) => v,
        Err(response) => return response,
    };

    let logs_html: Vec<String> = state
        .log_buffer
        .recent(LOG_BACKLOG)
        .iter()
        .map(|entry| {
            format!(
                r#"<div class="log-entry {}"><span class="time">{}</span> <span class="level">{}</span> <span class="target">[{}]</span> {}</div>"#,
                entry.css_class(),
                entry.timestamp.format("%H:%M:%S%.3f"),
                entry.level,
                html_escape(&entry.target),
                html_escape(&entry.message)
            )
        })
        .collect();

    let body = format!(
        r#"{style}
        <h2>ライブログ</h2>
        <p style="margin-bottom: 0.75rem;"><span id="live-indicator"></span><span id="status">接続中...</span>
            <label style="margin-left: 1rem;"><input type="checkbox" id="autoscroll" checked style="width: auto;"> 自動スクロール</label></p>
        <div class="log-container" id="logs">{logs}</div>
        <script>
            const logs = document.getElementById('logs');
            const autoscroll = document.getElementById('autoscroll');
            const indicator = document.getElementById('live-indicator');
            const status = document.getElementById('status');

            function escapeHtml(text) {{
                const div = document.createElement('div');
                div.textContent = text;
                return div.innerHTML;
            }}

            function scrollToBottom() {{
                if (autoscroll.checked) {{ logs.scrollTop = logs.scrollHeight; }}
            }}

            const source = new EventSource('/admin/logs/stream');
            source.onopen = function() {{
                indicator.classList.remove('disconnected');
                status.textContent = '接続済み';
            }};
            source.onmessage = function(event) {{
                const entry = JSON.parse(event.data);
                const div = document.createElement('div');
                div.className = 'log-entry ' + entry.level.toLowerCase();
                div.innerHTML = '<span class="time">' + new Date(entry.timestamp).toLocaleTimeString('ja-JP') + '</span> ' +
                    '<span class="level">' + entry.level + '</span> ' +
                    '<span class="target">[' + escapeHtml(entry.target) + ']</span> ' +
                    escapeHtml(entry.message);
                logs.appendChild(div);
                while (logs.children.length > 500) {{ logs.removeChild(logs.firstChild); }}
                scrollToBottom();
            }};
            source.onerror = function() {{
                indicator.classList.add('disconnected');
                status.textContent = '切断されました。再接続中...';
            }};
            scrollToBottom();
        </script>"#,
        style = LOG_STYLE,
        logs = logs_html.join("\n")
    );
    Html(layout("ログ", Some(&viewer.user), Nav::Admin, &body)).into_response()
}

/// GET /admin/logs/stream - SSE endpoint for live logs
async fn logs_stream(headers: HeaderMap, State(state): State<AppState>) -> Response {
    if let Err(response) = require_admin(&headers, &state).await {
        return response;
    }

    let stream = BroadcastStream::new(state.log_buffer.subscribe()).filter_map(|result| {
        // lagged receivers skip ahead
        result
            .ok()
            .map(|entry| Ok::<_, Infallible>(Event::default().data(entry.to_json())))
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
        .into_response()
}
