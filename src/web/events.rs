//! Event list, calendar, event detail with attendance, and strategy advice.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::collections::HashSet;

use super::access::require_member;
use super::account::FlashParams;
use super::pages::{
    banner, error_banner, error_redirect, event_card, html_escape, layout, notice_redirect,
    status_class, type_badge, Nav,
};
use super::server::AppState;
use crate::calendar::{month_grid, Month, WEEKDAYS};
use crate::models::{
    team_roster, time_format, upcoming, AttendanceStatus, EventType, FutsalEvent, NewEvent, User,
    UNKNOWN_MEMBER,
};

#[derive(Deserialize)]
pub struct CalendarParams {
    month: Option<String>,
}

#[derive(Deserialize)]
pub struct NewEventParams {
    date: Option<String>,
    msg: Option<String>,
}

#[derive(Deserialize)]
pub struct EventForm {
    title: String,
    event_type: String,
    date: String,
    start_time: String,
    end_time: String,
    location: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
pub struct AttendanceForm {
    #[serde(default)]
    status: String,
    #[serde(default)]
    comment: String,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// GET /events - upcoming events as cards
pub async fn list(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<FlashParams>,
) -> Response {
    let viewer = match require_member(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };

    let content = match state.team.ensure_loaded().await {
        Ok(()) => {
            let events = state.team.cache().read().await.events();
            let list = upcoming(&events, today());
            if list.is_empty() {
                r#"<div class="card muted">予定されているイベントはありません。</div>"#.to_string()
            } else {
                list.into_iter().map(event_card).collect::<Vec<_>>().join("\n")
            }
        }
        Err(e) => error_banner(&e.user_message()),
    };

    let body = format!(
        r#"{}
        <div style="display: flex; justify-content: space-between; align-items: center; margin-bottom: 1rem;">
            <h2 style="margin: 0;">今後のイベント</h2>
            <a class="button" href="/events/new">＋ イベント作成</a>
        </div>
        {}"#,
        banner(params.msg.as_deref()),
        content
    );
    Html(layout("イベント", Some(&viewer.user), Nav::Events, &body)).into_response()
}

/// GET /calendar?month=YYYY-MM
pub async fn calendar(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<CalendarParams>,
) -> Response {
    let viewer = match require_member(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };

    let today = today();
    let month = params
        .month
        .as_deref()
        .and_then(|m| m.parse::<Month>().ok())
        .unwrap_or_else(|| Month::containing(today));

    let (events, load_error) = match state.team.ensure_loaded().await {
        Ok(()) => (state.team.cache().read().await.events(), String::new()),
        Err(e) => (Vec::new(), error_banner(&e.user_message())),
    };

    let mut cells: Vec<String> = WEEKDAYS
        .iter()
        .enumerate()
        .map(|(i, day)| {
            let class = match i {
                0 => "head sun",
                6 => "head sat",
                _ => "head",
            };
            format!(r#"<div class="{}">{}</div>"#, class, day)
        })
        .collect();

    for cell in month_grid(month, &events) {
        let cell = match cell {
            Some(cell) => cell,
            None => {
                cells.push(r#"<div class="cell blank"></div>"#.to_string());
                continue;
            }
        };
        let chips: String = cell
            .events
            .iter()
            .map(|e| {
                format!(
                    r#"<a class="chip" style="background: {}" href="/events/{}">{}</a>"#,
                    e.event_type.color(),
                    urlencoding::encode(&e.id),
                    html_escape(&e.title)
                )
            })
            .collect();
        cells.push(format!(
            r#"<div class="cell"><a class="day{}" href="/events/new?date={}">{}</a>{}</div>"#,
            if cell.date == today { " today" } else { "" },
            cell.date.format("%Y-%m-%d"),
            cell.date.format("%-d"),
            chips
        ));
    }

    let body = format!(
        r#"{}
        <div style="display: flex; justify-content: space-between; align-items: center; margin-bottom: 1rem;">
            <a class="button secondary" href="/calendar?month={}">‹</a>
            <h2 style="margin: 0;">{}</h2>
            <a class="button secondary" href="/calendar?month={}">›</a>
        </div>
        <div class="calendar">{}</div>"#,
        load_error,
        month.prev().key(),
        month.title(),
        month.next().key(),
        cells.join("")
    );
    Html(layout("カレンダー", Some(&viewer.user), Nav::Calendar, &body)).into_response()
}

/// GET /events/new?date=YYYY-MM-DD
pub async fn new_form(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<NewEventParams>,
) -> Response {
    let viewer = match require_member(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };

    let date = params
        .date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .unwrap_or_else(today);

    let options: String = EventType::ALL
        .iter()
        .map(|t| {
            format!(
                r#"<option value="{}"{}>{}</option>"#,
                t.as_str(),
                if *t == EventType::Practice { " selected" } else { "" },
                t.label()
            )
        })
        .collect();

    let body = format!(
        r#"<div class="card" style="max-width: 640px;">
            <h2>イベント作成</h2>
            {}
            <form class="stack" method="post" action="/events">
                <label>タイトル<input type="text" name="title" required placeholder="例: 定期練習"></label>
                <label>種別<select name="event_type">{}</select></label>
                <label>日付<input type="date" name="date" value="{}" required></label>
                <div class="row">
                    <label>開始<input type="time" name="start_time" value="19:00" required></label>
                    <label>終了<input type="time" name="end_time" value="21:00" required></label>
                </div>
                <label>場所<input type="text" name="location" required></label>
                <label>メモ<textarea name="description" rows="3"></textarea></label>
                <div><button type="submit">作成する</button> <a class="button secondary" href="/events">キャンセル</a></div>
            </form>
        </div>"#,
        banner(params.msg.as_deref()),
        options,
        date.format("%Y-%m-%d")
    );
    Html(layout("イベント作成", Some(&viewer.user), Nav::Events, &body)).into_response()
}

fn parse_event_form(form: EventForm) -> Result<NewEvent, &'static str> {
    let event_type = form
        .event_type
        .parse::<EventType>()
        .map_err(|_| "種別を選択してください")?;
    let date = NaiveDate::parse_from_str(form.date.trim(), "%Y-%m-%d")
        .map_err(|_| "日付を正しく入力してください")?;
    let start_time = time_format::parse(&form.start_time).ok_or("開始時刻を正しく入力してください")?;
    let end_time = time_format::parse(&form.end_time).ok_or("終了時刻を正しく入力してください")?;

    Ok(NewEvent {
        title: form.title,
        event_type,
        date,
        start_time,
        end_time,
        location: form.location,
        description: form.description.trim().to_string(),
    })
}

/// POST /events
pub async fn create(
    headers: HeaderMap,
    State(state): State<AppState>,
    Form(form): Form<EventForm>,
) -> Response {
    let viewer = match require_member(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };

    let event = match parse_event_form(form) {
        Ok(event) => event,
        Err(message) => return Redirect::to(&error_redirect("/events/new", message)).into_response(),
    };
    match state.team.create_event(&viewer.user, event).await {
        Ok(created) => Redirect::to(&notice_redirect(
            &format!("/events/{}", urlencoding::encode(&created.id)),
            "イベントを作成しました",
        ))
        .into_response(),
        Err(e) => Redirect::to(&error_redirect("/events/new", &e.user_message())).into_response(),
    }
}

fn render_detail(
    viewer: &User,
    event: &FutsalEvent,
    users: &[User],
    msg: Option<&str>,
    advice: Option<&str>,
) -> String {
    let id = urlencoding::encode(&event.id);
    let mine = event.attendance_for(&viewer.id);
    let current = mine.map(|a| a.status).unwrap_or(AttendanceStatus::Unset);

    let radios: String = AttendanceStatus::CHOICES
        .iter()
        .map(|s| {
            format!(
                r#"<label class="{}" style="flex: 0;"><input type="radio" name="status" value="{}"{} style="width: auto;"> {}</label>"#,
                status_class(*s),
                s.as_str(),
                if *s == current { " checked" } else { "" },
                s.label()
            )
        })
        .collect();

    let roster = team_roster(event, users);
    let listed: HashSet<&str> = roster.iter().map(|r| r.user.id.as_str()).collect();
    let mut rows: Vec<String> = roster
        .iter()
        .map(|entry| {
            let (class, label) = match entry.attendance {
                Some(a) => (status_class(a.status), a.status.label()),
                None => (status_class(AttendanceStatus::Unset), "PENDING"),
            };
            format!(
                r#"<tr><td><img class="avatar" src="{}" alt=""> {}</td><td class="{}">{}</td><td class="muted">{}</td></tr>"#,
                html_escape(&entry.user.avatar_url()),
                html_escape(&entry.user.name),
                class,
                label,
                html_escape(entry.attendance.and_then(|a| a.comment.as_deref()).unwrap_or(""))
            )
        })
        .collect();
    // answers whose member is gone or no longer approved
    rows.extend(
        event
            .attendees
            .iter()
            .filter(|a| !listed.contains(a.user_id.as_str()))
            .map(|a| {
                let name = if a.user_name.is_empty() {
                    UNKNOWN_MEMBER
                } else {
                    a.user_name.as_str()
                };
                format!(
                    r#"<tr><td class="muted">{}</td><td class="{}">{}</td><td class="muted">{}</td></tr>"#,
                    html_escape(name),
                    status_class(a.status),
                    a.status.label(),
                    html_escape(a.comment.as_deref().unwrap_or(""))
                )
            }),
    );

    let advice_block = match advice {
        Some(text) => format!(
            r#"<div class="card"><h3 style="margin-bottom: 0.5rem;">AI戦術アドバイス</h3><div class="advice">{}</div></div>"#,
            html_escape(text)
        ),
        None => String::new(),
    };

    format!(
        r#"{banner}
        <div class="card">
            <div>{badge} <span class="muted">{date} {start}〜{end}</span></div>
            <h2 style="margin: 0.5rem 0;">{title}</h2>
            <div class="muted">📍 {location}</div>
            {description}
            <div class="counts">
                <span class="going">{going_label} {going}</span>
                <span class="maybe">{maybe_label} {maybe}</span>
                <span class="absent">{absent_label} {absent}</span>
            </div>
        </div>
        <div class="card">
            <h3 style="margin-bottom: 0.75rem;">あなたの出欠</h3>
            <form class="stack" method="post" action="/events/{id}/attendance">
                <div class="row">{radios}</div>
                <label>コメント<input type="text" name="comment" value="{comment}" placeholder="遅れて参加します など"></label>
                <div><button type="submit">回答する</button></div>
            </form>
        </div>
        <div class="card">
            <form method="post" action="/events/{id}/advice">
                <button type="submit" class="secondary">AI戦術アドバイスを見る</button>
            </form>
        </div>
        {advice}
        <h3 style="margin: 1.5rem 0 0.75rem;">メンバーの出欠</h3>
        <table>
            <thead><tr><th>名前</th><th>出欠</th><th>コメント</th></tr></thead>
            <tbody>{rows}</tbody>
        </table>"#,
        banner = banner(msg),
        badge = type_badge(event.event_type),
        date = event.date.format("%Y/%m/%d"),
        start = event.start_time.format("%H:%M"),
        end = event.end_time.format("%H:%M"),
        title = html_escape(&event.title),
        location = html_escape(&event.location),
        description = if event.description.is_empty() {
            String::new()
        } else {
            format!(
                r#"<p style="margin-top: 0.5rem; white-space: pre-wrap;">{}</p>"#,
                html_escape(&event.description)
            )
        },
        going_label = AttendanceStatus::Going.label(),
        going = event.count(AttendanceStatus::Going),
        maybe_label = AttendanceStatus::Maybe.label(),
        maybe = event.count(AttendanceStatus::Maybe),
        absent_label = AttendanceStatus::Absent.label(),
        absent = event.count(AttendanceStatus::Absent),
        id = id,
        radios = radios,
        comment = html_escape(mine.and_then(|a| a.comment.as_deref()).unwrap_or("")),
        advice = advice_block,
        rows = rows.join(""),
    )
}

async fn detail_page(
    state: &AppState,
    viewer: &User,
    event_id: &str,
    msg: Option<&str>,
    advice: Option<&str>,
) -> Response {
    if let Err(e) = state.team.ensure_loaded().await {
        let body = error_banner(&e.user_message());
        return Html(layout("イベント", Some(viewer), Nav::Events, &body)).into_response();
    }

    let cache = state.team.cache().read().await;
    let event = match cache.event(event_id) {
        Some(event) => event,
        None => {
            return Redirect::to(&error_redirect("/events", "イベントが見つかりません"))
                .into_response()
        }
    };
    let users = cache.users();
    let body = render_detail(viewer, event, &users, msg, advice);
    Html(layout(&event.title, Some(viewer), Nav::Events, &body)).into_response()
}

/// GET /events/:id
pub async fn detail(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Query(params): Query<FlashParams>,
) -> Response {
    let viewer = match require_member(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };
    detail_page(&state, &viewer.user, &event_id, params.msg.as_deref(), None).await
}

/// POST /events/:id/attendance - the viewer's own answer
pub async fn attendance(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Form(form): Form<AttendanceForm>,
) -> Response {
    let viewer = match require_member(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };

    let path = format!("/events/{}", urlencoding::encode(&event_id));
    let status = form
        .status
        .parse::<AttendanceStatus>()
        .unwrap_or(AttendanceStatus::Unset);
    match state
        .team
        .update_attendance(&viewer.user, &event_id, status, &form.comment)
        .await
    {
        Ok(_) => Redirect::to(&notice_redirect(&path, "出欠を更新しました")).into_response(),
        Err(e) => Redirect::to(&error_redirect(&path, &e.user_message())).into_response(),
    }
}

/// POST /events/:id/advice - detail page with generated advice
pub async fn advice(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Response {
    let viewer = match require_member(&headers, &state).await {
        Ok(v) => v,
        Err(redirect) => return redirect,
    };

    let event = match state.team.event(&event_id).await {
        Some(event) => event,
        None => {
            return Redirect::to(&error_redirect("/events", "イベントが見つかりません"))
                .into_response()
        }
    };
    let text = state.advisory.team_strategy(&event).await;
    detail_page(&state, &viewer.user, &event_id, None, Some(&text)).await
}
