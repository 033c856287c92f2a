//! PostgREST-backed team store.
//!
//! Owns transport details only: request building, status mapping and JSON
//! decoding of the row types in `models::rows`.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{merge_attendance, TeamStore};
use crate::config::SupabaseConfig;
use crate::error::{AppError, Result};
use crate::models::rows::{
    AttendanceRow, AttendanceUpsertRow, EventRow, NewEventRow, ProfilePatch, ProfileRow,
};
use crate::models::{Attendance, AttendanceStatus, FutsalEvent, NewEvent, NewProfile, User, UserUpdate};

const ATTENDANCE_SELECT: &str = "*,profiles(name)";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Error body returned by PostgREST
#[derive(Deserialize)]
struct PostgrestError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

pub struct SupabaseStore {
    http: Client,
    rest_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            rest_url: config.rest_url(),
            api_key: config.anon_key.clone(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.rest_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Send and decode a JSON body, mapping non-2xx responses to store errors
    async fn fetch<T: DeserializeOwned>(&self, table: &str, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(store_error(table, status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| AppError::Decode {
            endpoint: table.to_string(),
            message: e.to_string(),
        })
    }

    /// Send a request whose response body is not needed
    async fn execute(&self, table: &str, request: RequestBuilder) -> Result<()> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(store_error(table, status.as_u16(), &body));
        }
        Ok(())
    }
}

fn store_error(table: &str, status: u16, body: &str) -> AppError {
    let message = match serde_json::from_str::<PostgrestError>(body) {
        Ok(err) => match err.code {
            Some(code) => format!("{} ({})", err.message, code),
            None => err.message,
        },
        Err(_) => body.to_string(),
    };
    warn!("Store request on '{}' failed with {}: {}", table, status, message);
    AppError::Store { status, message }
}

fn first_row<T>(table: &str, rows: Vec<T>) -> Result<T> {
    rows.into_iter().next().ok_or_else(|| AppError::Decode {
        endpoint: table.to_string(),
        message: "expected one row in representation, got none".to_string(),
    })
}

#[async_trait]
impl TeamStore for SupabaseStore {
    async fn list_users(&self) -> Result<Vec<User>> {
        let request = self
            .request(Method::GET, "profiles")
            .query(&[("select", "*"), ("order", "created_at.asc")]);
        let rows: Vec<ProfileRow> = self.fetch("profiles", request).await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<User>> {
        let request = self.request(Method::GET, "profiles").query(&[
            ("select", "*".to_string()),
            ("id", format!("eq.{}", user_id)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<ProfileRow> = self.fetch("profiles", request).await?;
        Ok(rows.into_iter().next().map(User::from))
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<User> {
        let request = self
            .request(Method::POST, "profiles")
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&[ProfileRow::from(profile)]);
        let rows: Vec<ProfileRow> = self.fetch("profiles", request).await?;
        first_row("profiles", rows).map(User::from)
    }

    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        let request = self
            .request(Method::PATCH, "profiles")
            .query(&[("id", format!("eq.{}", user_id))])
            .header("Prefer", "return=minimal")
            .json(&ProfilePatch::from(update));
        self.execute("profiles", request).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, "profiles")
            .query(&[("id", format!("eq.{}", user_id))]);
        self.execute("profiles", request).await
    }

    async fn list_events(&self) -> Result<Vec<FutsalEvent>> {
        let events_request = self
            .request(Method::GET, "events")
            .query(&[("select", "*"), ("order", "date.asc")]);
        let events: Vec<EventRow> = self.fetch("events", events_request).await?;

        let attendance_request = self
            .request(Method::GET, "attendance")
            .query(&[("select", ATTENDANCE_SELECT)]);
        let rows: Vec<AttendanceRow> = self.fetch("attendance", attendance_request).await?;

        debug!("Fetched {} events and {} attendance rows", events.len(), rows.len());
        Ok(merge_attendance(events, rows))
    }

    async fn create_event(&self, event: &NewEvent) -> Result<FutsalEvent> {
        let request = self
            .request(Method::POST, "events")
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&[NewEventRow::from(event)]);
        let rows: Vec<EventRow> = self.fetch("events", request).await?;
        first_row("events", rows).map(|row| row.into_event(Vec::new()))
    }

    async fn upsert_attendance(
        &self,
        event_id: &str,
        user_id: &str,
        status: AttendanceStatus,
        comment: &str,
    ) -> Result<Attendance> {
        let body = AttendanceUpsertRow {
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            status,
            comment: comment.to_string(),
            updated_at: Utc::now(),
        };
        let request = self
            .request(Method::POST, "attendance")
            .query(&[("on_conflict", "event_id,user_id"), ("select", ATTENDANCE_SELECT)])
            .header(
                "Prefer",
                format!("resolution=merge-duplicates,{}", RETURN_REPRESENTATION),
            )
            .json(&[body]);
        let rows: Vec<AttendanceRow> = self.fetch("attendance", request).await?;
        first_row("attendance", rows).map(Attendance::from)
    }

    async fn delete_attendance_for_user(&self, user_id: &str) -> Result<usize> {
        let request = self
            .request(Method::DELETE, "attendance")
            .query(&[
                ("user_id", format!("eq.{}", user_id)),
                ("select", "event_id".to_string()),
            ])
            .header("Prefer", RETURN_REPRESENTATION);
        let removed: Vec<serde_json::Value> = self.fetch("attendance", request).await?;
        Ok(removed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    type Seen = Arc<parking_lot::Mutex<Vec<(HashMap<String, String>, Option<String>)>>>;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn store_for(url: String) -> SupabaseStore {
        SupabaseStore::new(&SupabaseConfig {
            url,
            anon_key: "anon".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_events_merges_attendance() {
        let router = Router::new()
            .route(
                "/rest/v1/events",
                get(|| async {
                    Json(serde_json::json!([
                        {"id": "e1", "title": "Practice", "type": "PRACTICE", "date": "2024-06-01",
                         "start_time": "19:00:00", "end_time": "21:00:00", "location": "Court A",
                         "description": ""},
                        {"id": "e2", "title": "Match", "type": "MATCH", "date": "2024-06-08",
                         "start_time": "10:00:00", "end_time": "12:00:00", "location": "Court B",
                         "description": null}
                    ]))
                }),
            )
            .route(
                "/rest/v1/attendance",
                get(|| async {
                    Json(serde_json::json!([
                        {"event_id": "e2", "user_id": "u1", "status": "GOING", "comment": "late",
                         "updated_at": "2024-06-01T10:00:00Z", "profiles": {"name": "A"}},
                        {"event_id": "e2", "user_id": "u2", "status": "ABSENT", "comment": null,
                         "updated_at": "2024-06-01T11:00:00Z", "profiles": null}
                    ]))
                }),
            );
        let store = store_for(serve(router).await);

        let events = store.list_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].attendees.is_empty());
        assert_eq!(events[1].attendees.len(), 2);
        assert_eq!(events[1].count(AttendanceStatus::Going), 1);
        assert!(events[1].attendees.iter().any(|a| a.user_name == "Unknown"));
    }

    #[tokio::test]
    async fn test_upsert_sends_conflict_target_and_merge_preference() {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route(
                "/rest/v1/attendance",
                axum::routing::post(
                    |State(seen): State<Seen>,
                     Query(query): Query<HashMap<String, String>>,
                     headers: HeaderMap| async move {
                        let prefer = headers
                            .get("prefer")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        seen.lock().push((query, prefer));
                        Json(serde_json::json!([
                            {"event_id": "e1", "user_id": "u1", "status": "MAYBE",
                             "comment": "30分遅れます", "updated_at": "2024-06-01T10:00:00Z",
                             "profiles": {"name": "田中 太郎"}}
                        ]))
                    },
                ),
            )
            .with_state(seen.clone());
        let store = store_for(serve(router).await);

        let attendance = store
            .upsert_attendance("e1", "u1", AttendanceStatus::Maybe, "30分遅れます")
            .await
            .unwrap();
        assert_eq!(attendance.user_name, "田中 太郎");
        assert_eq!(attendance.status, AttendanceStatus::Maybe);

        let seen = seen.lock();
        let (query, prefer) = &seen[0];
        assert_eq!(query.get("on_conflict").map(String::as_str), Some("event_id,user_id"));
        assert!(prefer
            .as_deref()
            .unwrap_or_default()
            .contains("resolution=merge-duplicates"));
    }

    #[tokio::test]
    async fn test_failed_read_is_an_error_not_an_empty_list() {
        let router = Router::new().route(
            "/rest/v1/profiles",
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({"message": "Invalid API key", "code": "401"})),
                )
            }),
        );
        let store = store_for(serve(router).await);

        match store.list_users().await {
            Err(AppError::Store { status, message }) => {
                assert_eq!(status, 401);
                assert!(message.contains("Invalid API key"));
            }
            other => panic!("expected store error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_profile_is_none() {
        let router = Router::new().route(
            "/rest/v1/profiles",
            get(|| async { Json(serde_json::json!([])) }),
        );
        let store = store_for(serve(router).await);

        assert_eq!(store.get_profile("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_transport_error() {
        let store = store_for("http://127.0.0.1:9".to_string());
        assert!(matches!(
            store.list_events().await,
            Err(AppError::Transport { .. })
        ));
    }
}
