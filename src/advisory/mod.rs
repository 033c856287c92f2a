//! Strategy advice from the generative model.
//!
//! `team_strategy` never fails: every error is turned into one of the fixed
//! notices below, which the event page shows in place of the advice.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AdvisoryConfig;
use crate::models::{AttendanceStatus, FutsalEvent};

pub const MISSING_KEY_NOTICE: &str = "APIキーが設定されていません。管理者に連絡してください。";
pub const INVALID_KEY_NOTICE: &str = "APIキーが無効です。設定を確認してください。";
pub const FAILURE_NOTICE: &str = "AIアドバイスの取得中にエラーが発生しました。";
pub const EMPTY_NOTICE: &str = "アドバイスを取得できませんでした。";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Prompt for one event: headcount and names of the GOING members
pub fn build_prompt(event: &FutsalEvent) -> String {
    let going = event.count(AttendanceStatus::Going);
    let names = event.going_names().join(", ");

    format!(
        "フットサルチームのイベントに関するアドバイスをお願いします。\n\
         イベント名: {}\n\
         場所: {}\n\
         イベントタイプ: {}\n\
         参加人数: {}名\n\
         参加者: {}\n\
         \n\
         上記の情報に基づき、以下の3点について日本語で回答してください：\n\
         1. 推奨される練習メニューまたは試合プラン\n\
         2. 参加人数に対するおすすめの交代ペース\n\
         3. モチベーションを上げる一言\n",
        event.title,
        event.location,
        event.event_type.as_str(),
        going,
        names
    )
}

pub struct AdvisoryClient {
    http: Client,
    config: AdvisoryConfig,
}

pub type SharedAdvisoryClient = Arc<AdvisoryClient>;

impl AdvisoryClient {
    pub fn new(config: AdvisoryConfig) -> crate::error::Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Advice text for `event`, or a fixed notice when the call fails
    pub async fn team_strategy(&self, event: &FutsalEvent) -> String {
        let api_key = match &self.config.api_key {
            Some(key) => key,
            None => {
                error!("Generative model API key is missing; set API_KEY");
                return MISSING_KEY_NOTICE.to_string();
            }
        };

        let prompt = build_prompt(event);
        let body = GenerateRequest {
            contents: [Content {
                parts: [RequestPart { text: &prompt }],
            }],
        };

        let response = match self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Advisory request failed: {}", e);
                return FAILURE_NOTICE.to_string();
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!("Advisory call returned {}: {}", status, detail);
            if detail.contains("API_KEY_INVALID") {
                return INVALID_KEY_NOTICE.to_string();
            }
            return FAILURE_NOTICE.to_string();
        }

        match response.json::<GenerateResponse>().await {
            Ok(parsed) => {
                let text = parsed.text();
                if text.trim().is_empty() {
                    warn!("Advisory response for event {} had no text", event.id);
                    EMPTY_NOTICE.to_string()
                } else {
                    info!("Generated advice for event {}", event.id);
                    text
                }
            }
            Err(e) => {
                error!("Failed to decode advisory response: {}", e);
                FAILURE_NOTICE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attendance, EventType};
    use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
    use chrono::{NaiveDate, NaiveTime, Utc};
    use serde_json::json;
    use std::time::Duration;

    fn event() -> FutsalEvent {
        let answer = |user_id: &str, name: &str, status| Attendance {
            event_id: "e1".to_string(),
            user_id: user_id.to_string(),
            user_name: name.to_string(),
            status,
            comment: None,
            updated_at: Utc::now(),
        };
        FutsalEvent {
            id: "e1".to_string(),
            title: "定期練習".to_string(),
            event_type: EventType::Practice,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            location: "第1コート".to_string(),
            description: String::new(),
            attendees: vec![
                answer("u1", "田中 太郎", AttendanceStatus::Going),
                answer("u2", "佐藤 健", AttendanceStatus::Going),
                answer("u3", "鈴木 一郎", AttendanceStatus::Absent),
            ],
        }
    }

    fn config(api_key: Option<&str>, base_url: String) -> AdvisoryConfig {
        AdvisoryConfig {
            api_key: api_key.map(str::to_string),
            model: "test-model".to_string(),
            base_url,
            timeout: Duration::from_secs(5),
        }
    }

    async fn serve(status: StatusCode, body: serde_json::Value) -> String {
        let app = Router::new().route(
            "/v1beta/models/:call",
            post(move || {
                let body = body.clone();
                async move { (status, Json(body)).into_response() }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_prompt_lists_going_members_only() {
        let prompt = build_prompt(&event());
        assert!(prompt.contains("参加人数: 2名"));
        assert!(prompt.contains("参加者: 田中 太郎, 佐藤 健"));
        assert!(prompt.contains("イベントタイプ: PRACTICE"));
        assert!(!prompt.contains("鈴木"));
    }

    #[tokio::test]
    async fn test_missing_key_returns_fixed_notice() {
        let client = AdvisoryClient::new(config(None, "http://127.0.0.1:9".to_string())).unwrap();
        assert!(!client.is_configured());
        assert_eq!(client.team_strategy(&event()).await, MISSING_KEY_NOTICE);
    }

    #[tokio::test]
    async fn test_success_returns_model_text() {
        let base = serve(
            StatusCode::OK,
            json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "1. パス練習" }, { "text": "\n2. 5分交代" }] }
                }]
            }),
        )
        .await;
        let client = AdvisoryClient::new(config(Some("key"), base)).unwrap();
        assert_eq!(client.team_strategy(&event()).await, "1. パス練習\n2. 5分交代");
    }

    #[tokio::test]
    async fn test_invalid_key_and_other_failures() {
        let base = serve(
            StatusCode::BAD_REQUEST,
            json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "details": [{ "reason": "API_KEY_INVALID" }]
                }
            }),
        )
        .await;
        let client = AdvisoryClient::new(config(Some("bad"), base)).unwrap();
        assert_eq!(client.team_strategy(&event()).await, INVALID_KEY_NOTICE);

        let base = serve(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": {} })).await;
        let client = AdvisoryClient::new(config(Some("key"), base)).unwrap();
        assert_eq!(client.team_strategy(&event()).await, FAILURE_NOTICE);
    }

    #[tokio::test]
    async fn test_empty_candidates_return_empty_notice() {
        let base = serve(StatusCode::OK, json!({ "candidates": [] })).await;
        let client = AdvisoryClient::new(config(Some("key"), base)).unwrap();
        assert_eq!(client.team_strategy(&event()).await, EMPTY_NOTICE);
    }
}
