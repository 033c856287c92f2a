//! Shared HTML pieces: layout, navigation, banners, escaping.

use crate::models::{AttendanceStatus, EventType, FutsalEvent, User};

/// Top navigation entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Events,
    Calendar,
    Members,
    Settings,
    Admin,
    None,
}

const STYLE: &str = r#"
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Hiragino Sans', 'Segoe UI', Roboto, sans-serif;
            background: #f8fafc;
            min-height: 100vh;
            color: #1e293b;
        }
        .navbar {
            background: #fff;
            padding: 1rem 2rem;
            display: flex;
            justify-content: space-between;
            align-items: center;
            border-bottom: 1px solid #e2e8f0;
        }
        .navbar h1 { font-size: 1.25rem; font-weight: 900; color: #2563eb; }
        .navbar nav { display: flex; gap: 1rem; align-items: center; }
        .navbar nav a { color: #64748b; text-decoration: none; font-weight: 600; padding: 0.4rem 0.8rem; border-radius: 8px; }
        .navbar nav a.active { background: #eff6ff; color: #2563eb; }
        .navbar .user { display: flex; align-items: center; gap: 0.5rem; font-size: 0.9rem; }
        .avatar { width: 32px; height: 32px; border-radius: 50%; object-fit: cover; }
        .container { max-width: 1000px; margin: 0 auto; padding: 2rem 1rem; }
        .narrow { max-width: 420px; }
        h2 { margin-bottom: 1rem; }
        .card {
            background: #fff;
            border-radius: 16px;
            padding: 1.25rem;
            border: 1px solid #e2e8f0;
            margin-bottom: 1rem;
        }
        .cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 1rem; margin-bottom: 1.5rem; }
        .value { font-size: 2rem; font-weight: bold; }
        .muted { color: #64748b; font-size: 0.9rem; }
        .badge { display: inline-block; padding: 0.1rem 0.5rem; border-radius: 999px; font-size: 0.75rem; font-weight: 700; color: #fff; }
        .badge.admin { background: #1e293b; }
        .badge.self { background: #2563eb; }
        .counts { display: flex; gap: 1rem; margin-top: 0.5rem; font-size: 0.85rem; }
        .going { color: #16a34a; } .maybe { color: #d97706; } .absent { color: #dc2626; } .unset { color: #94a3b8; }
        .banner { padding: 0.8rem 1rem; border-radius: 10px; margin-bottom: 1rem; font-weight: 600; }
        .banner.error { background: #fef2f2; color: #b91c1c; border: 1px solid #fecaca; }
        .banner.success { background: #f0fdf4; color: #15803d; border: 1px solid #bbf7d0; }
        form.stack { display: flex; flex-direction: column; gap: 0.75rem; }
        form.inline { display: inline; }
        label { font-size: 0.85rem; font-weight: 700; color: #475569; }
        input, select, textarea {
            width: 100%; padding: 0.6rem 0.8rem; border: 1px solid #cbd5e1; border-radius: 10px; font-size: 1rem;
        }
        .row { display: flex; gap: 0.75rem; }
        .row > * { flex: 1; }
        button, .button {
            display: inline-block; padding: 0.6rem 1.2rem; border: none; border-radius: 10px;
            background: #2563eb; color: #fff; font-weight: 700; font-size: 0.95rem; cursor: pointer; text-decoration: none;
        }
        button.secondary, .button.secondary { background: #e2e8f0; color: #334155; }
        button.danger { background: #dc2626; }
        button.small { padding: 0.3rem 0.7rem; font-size: 0.8rem; }
        table { width: 100%; border-collapse: collapse; background: #fff; border-radius: 12px; overflow: hidden; }
        th, td { padding: 0.75rem; text-align: left; border-bottom: 1px solid #f1f5f9; vertical-align: middle; }
        th { color: #64748b; font-weight: 600; font-size: 0.85rem; }
        a { color: #2563eb; }
        .calendar { display: grid; grid-template-columns: repeat(7, 1fr); background: #fff; border: 1px solid #e2e8f0; border-radius: 16px; overflow: hidden; }
        .calendar .head { padding: 0.6rem; text-align: center; font-size: 0.75rem; font-weight: 700; color: #94a3b8; border-bottom: 1px solid #f1f5f9; }
        .calendar .head.sun { color: #ef4444; } .calendar .head.sat { color: #3b82f6; }
        .calendar .cell { min-height: 100px; padding: 0.3rem; border-right: 1px solid #f1f5f9; border-bottom: 1px solid #f1f5f9; }
        .calendar .cell.blank { background: #f8fafc; }
        .calendar .day { display: inline-block; width: 1.6rem; height: 1.6rem; line-height: 1.6rem; text-align: center; border-radius: 50%; font-size: 0.75rem; font-weight: 600; color: #334155; text-decoration: none; }
        .calendar .day.today { background: #2563eb; color: #fff; }
        .chip { display: block; margin-top: 0.2rem; padding: 0.1rem 0.4rem; border-radius: 4px; font-size: 0.7rem; font-weight: 700; color: #fff; text-decoration: none; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; }
        .advice { white-space: pre-wrap; background: #eff6ff; border-radius: 12px; padding: 1rem; }
"#;

/// Full page with the navigation bar when a user is signed in
pub fn layout(title: &str, user: Option<&User>, active: Nav, body: &str) -> String {
    let navbar = match user {
        Some(user) => {
            let link = |nav: Nav, href: &str, label: &str| {
                format!(
                    r#"<a href="{}"{}>{}</a>"#,
                    href,
                    if nav == active { r#" class="active""# } else { "" },
                    label
                )
            };
            let mut links = vec![
                link(Nav::Events, "/events", "イベント"),
                link(Nav::Calendar, "/calendar", "カレンダー"),
                link(Nav::Members, "/members", "メンバー"),
                link(Nav::Settings, "/settings", "設定"),
            ];
            if user.is_admin() {
                links.push(link(Nav::Admin, "/admin", "管理"));
            }
            format!(
                r#"<div class="navbar">
        <h1>Futsal Connect</h1>
        <nav>{}</nav>
        <div class="user"><img class="avatar" src="{}" alt=""><span>{}</span></div>
    </div>"#,
                links.join(""),
                html_escape(&user.avatar_url()),
                html_escape(&user.name)
            )
        }
        None => String::new(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="ja">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{} - Futsal Connect</title>
    <style>{}</style>
</head>
<body>
    {}
    <div class="container">
        {}
    </div>
</body>
</html>"#,
        html_escape(title),
        STYLE,
        navbar,
        body
    )
}

/// Banner for a `?msg=` flash value. Values prefixed with `error:` are
/// errors, anything else is shown as a success notice.
pub fn banner(msg: Option<&str>) -> String {
    match msg {
        Some(msg) if msg.starts_with("error:") => format!(
            r#"<div class="banner error">{}</div>"#,
            html_escape(msg.trim_start_matches("error:"))
        ),
        Some(msg) if !msg.is_empty() => format!(
            r#"<div class="banner success">{}</div>"#,
            html_escape(msg)
        ),
        _ => String::new(),
    }
}

pub fn error_banner(message: &str) -> String {
    format!(r#"<div class="banner error">{}</div>"#, html_escape(message))
}

/// `path?msg=error:...` for redirects after a failed mutation
pub fn error_redirect(path: &str, message: &str) -> String {
    format!(
        "{}?msg={}",
        path,
        urlencoding::encode(&format!("error:{}", message))
    )
}

pub fn notice_redirect(path: &str, message: &str) -> String {
    format!("{}?msg={}", path, urlencoding::encode(message))
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn type_badge(event_type: EventType) -> String {
    format!(
        r#"<span class="badge" style="background: {}">{}</span>"#,
        event_type.color(),
        event_type.label()
    )
}

pub fn status_class(status: AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::Going => "going",
        AttendanceStatus::Maybe => "maybe",
        AttendanceStatus::Absent => "absent",
        AttendanceStatus::Unset => "unset",
    }
}

/// Card for the event list
pub fn event_card(event: &FutsalEvent) -> String {
    format!(
        r#"<a href="/events/{id}" style="text-decoration: none; color: inherit;">
        <div class="card">
            <div>{badge} <span class="muted">{date} {start}〜{end}</span></div>
            <h3 style="margin: 0.4rem 0;">{title}</h3>
            <div class="muted">📍 {location}</div>
            <div class="counts">
                <span class="going">{going_label} {going}</span>
                <span class="maybe">{maybe_label} {maybe}</span>
                <span class="absent">{absent_label} {absent}</span>
            </div>
        </div>
        </a>"#,
        id = urlencoding::encode(&event.id),
        badge = type_badge(event.event_type),
        date = event.date.format("%Y/%m/%d"),
        start = event.start_time.format("%H:%M"),
        end = event.end_time.format("%H:%M"),
        title = html_escape(&event.title),
        location = html_escape(&event.location),
        going_label = AttendanceStatus::Going.label(),
        going = event.count(AttendanceStatus::Going),
        maybe_label = AttendanceStatus::Maybe.label(),
        maybe = event.count(AttendanceStatus::Maybe),
        absent_label = AttendanceStatus::Absent.label(),
        absent = event.count(AttendanceStatus::Absent),
    )
}
