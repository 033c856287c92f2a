//! In-process team store.
//!
//! Mirrors the relational schema closely enough to stand in for the hosted
//! store: profiles keep insertion order, attendance is unique per
//! (event_id, user_id), and deleting a profile does not cascade.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{merge_attendance, TeamStore};
use crate::error::{AppError, Result};
use crate::models::rows::{AttendanceRow, EventRow, NewEventRow, ProfileName};
use crate::models::{
    Attendance, AttendanceStatus, EventType, FutsalEvent, NewEvent, NewProfile, Role, User,
    UserUpdate,
};

#[derive(Default)]
struct Tables {
    /// Insertion order doubles as created_at order
    profiles: Vec<User>,
    events: Vec<EventRow>,
    attendance: HashMap<(String, String), AttendanceRow>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Demo roster and two upcoming events relative to `today`
    pub fn with_demo_data(today: NaiveDate) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write();
            let roster = [
                ("u1", "田中 太郎", "tanaka@example.com", Role::Admin, "ALA"),
                ("u2", "佐藤 健", "sato@example.com", Role::Member, "PIVO"),
                ("u3", "鈴木 一郎", "suzuki@example.com", Role::Member, "FIXO"),
                ("u4", "高橋 翼", "takahashi@example.com", Role::Member, "GOLEIRO"),
                ("u5", "伊藤 直美", "ito@example.com", Role::Member, "ALA"),
            ];
            for (id, name, email, role, position) in roster {
                tables.profiles.push(User {
                    id: id.to_string(),
                    name: name.to_string(),
                    email: email.to_string(),
                    role,
                    position: Some(position.to_string()),
                    avatar: Some(format!("https://picsum.photos/seed/{}/100/100", id)),
                    is_approved: true,
                });
            }

            let time = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap_or_default();
            tables.events.push(EventRow {
                id: "e1".to_string(),
                title: "定期練習（フットサルステージ多摩）".to_string(),
                event_type: EventType::Practice,
                date: today + Duration::days(3),
                start_time: time(19),
                end_time: time(21),
                location: "フットサルステージ多摩 第1コート".to_string(),
                description: Some("パス回しとシュート練習を中心に行います。初心者歓迎！".to_string()),
            });
            tables.events.push(EventRow {
                id: "e2".to_string(),
                title: "リーグ戦 vs FCレッド".to_string(),
                event_type: EventType::Match,
                date: today + Duration::days(8),
                start_time: time(10),
                end_time: time(12),
                location: "代々木フットサルパーク".to_string(),
                description: Some("今季最大のライバルとの一戦です。ユニフォーム必携！".to_string()),
            });

            let answers = [
                ("e1", "u1", AttendanceStatus::Going),
                ("e1", "u2", AttendanceStatus::Going),
                ("e1", "u3", AttendanceStatus::Absent),
                ("e2", "u1", AttendanceStatus::Going),
                ("e2", "u4", AttendanceStatus::Going),
            ];
            for (event_id, user_id, status) in answers {
                tables.attendance.insert(
                    (event_id.to_string(), user_id.to_string()),
                    AttendanceRow {
                        event_id: event_id.to_string(),
                        user_id: user_id.to_string(),
                        status,
                        comment: None,
                        updated_at: Utc::now(),
                        profiles: None,
                    },
                );
            }
        }
        store
    }

    /// Make every call fail with a transport error, as if the store were down
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Attendance rows of an event, including rows of deleted users
    pub fn attendance_rows(&self, event_id: &str) -> Vec<Attendance> {
        let tables = self.tables.read();
        tables
            .attendance
            .values()
            .filter(|row| row.event_id == event_id)
            .map(|row| joined(&tables.profiles, row).into())
            .collect()
    }

    fn check_online(&self, endpoint: &str) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::Transport {
                endpoint: endpoint.to_string(),
                message: "store is offline".to_string(),
            });
        }
        Ok(())
    }
}

/// Attach the profile name the way the `profiles(name)` embed does
fn joined(profiles: &[User], row: &AttendanceRow) -> AttendanceRow {
    let mut row = row.clone();
    row.profiles = profiles
        .iter()
        .find(|u| u.id == row.user_id)
        .map(|u| ProfileName {
            name: u.name.clone(),
        });
    row
}

#[async_trait]
impl TeamStore for MemoryStore {
    async fn list_users(&self) -> Result<Vec<User>> {
        self.check_online("profiles")?;
        Ok(self.tables.read().profiles.clone())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<User>> {
        self.check_online("profiles")?;
        Ok(self
            .tables
            .read()
            .profiles
            .iter()
            .find(|u| u.id == user_id)
            .cloned())
    }

    async fn create_profile(&self, profile: NewProfile) -> Result<User> {
        self.check_online("profiles")?;
        let mut tables = self.tables.write();
        if tables.profiles.iter().any(|u| u.id == profile.id) {
            return Err(AppError::Store {
                status: 409,
                message: format!("duplicate key value: profiles.id = {}", profile.id),
            });
        }
        let user = profile.into_user();
        tables.profiles.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<()> {
        self.check_online("profiles")?;
        let mut tables = self.tables.write();
        // PATCH with a filter matching nothing succeeds in PostgREST too
        if let Some(user) = tables.profiles.iter_mut().find(|u| u.id == user_id) {
            update.apply_to(user);
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.check_online("profiles")?;
        self.tables.write().profiles.retain(|u| u.id != user_id);
        Ok(())
    }

    async fn list_events(&self) -> Result<Vec<FutsalEvent>> {
        self.check_online("events")?;
        let tables = self.tables.read();
        let mut events = tables.events.clone();
        events.sort_by(|a, b| a.date.cmp(&b.date));
        let rows = tables
            .attendance
            .values()
            .map(|row| joined(&tables.profiles, row))
            .collect();
        Ok(merge_attendance(events, rows))
    }

    async fn create_event(&self, event: &NewEvent) -> Result<FutsalEvent> {
        self.check_online("events")?;
        let row = NewEventRow::from(event);
        let created = EventRow {
            id: uuid::Uuid::new_v4().to_string(),
            title: row.title,
            event_type: row.event_type,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            location: row.location,
            description: Some(row.description),
        };
        self.tables.write().events.push(created.clone());
        Ok(created.into_event(Vec::new()))
    }

    async fn upsert_attendance(
        &self,
        event_id: &str,
        user_id: &str,
        status: AttendanceStatus,
        comment: &str,
    ) -> Result<Attendance> {
        self.check_online("attendance")?;
        let mut tables = self.tables.write();
        if !tables.events.iter().any(|e| e.id == event_id) {
            return Err(AppError::Store {
                status: 409,
                message: format!("attendance.event_id = {} violates foreign key", event_id),
            });
        }
        let row = AttendanceRow {
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            status,
            comment: Some(comment.to_string()),
            updated_at: Utc::now(),
            profiles: None,
        };
        let stored = joined(&tables.profiles, &row);
        tables
            .attendance
            .insert((event_id.to_string(), user_id.to_string()), row);
        Ok(stored.into())
    }

    async fn delete_attendance_for_user(&self, user_id: &str) -> Result<usize> {
        self.check_online("attendance")?;
        let mut tables = self.tables.write();
        let before = tables.attendance.len();
        tables.attendance.retain(|(_, uid), _| uid != user_id);
        Ok(before - tables.attendance.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::time_format;

    fn practice() -> NewEvent {
        NewEvent {
            title: "Practice".to_string(),
            event_type: EventType::Practice,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            start_time: time_format::parse("19:00").unwrap(),
            end_time: time_format::parse("21:00").unwrap(),
            location: "Court A".to_string(),
            description: String::new(),
        }
    }

    async fn member(store: &MemoryStore, id: &str) -> User {
        store
            .create_profile(NewProfile::new(id, &id.to_uppercase(), &format!("{}@example.com", id)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_created_event_has_no_attendees() {
        let store = MemoryStore::new();
        let created = store.create_event(&practice()).await.unwrap();

        let events = store.list_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, created.id);
        assert_eq!(events[0].title, "Practice");
        assert!(events[0].attendees.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_upsert_keeps_one_record_with_last_values() {
        let store = MemoryStore::new();
        member(&store, "a").await;
        let event = store.create_event(&practice()).await.unwrap();

        store
            .upsert_attendance(&event.id, "a", AttendanceStatus::Going, "late")
            .await
            .unwrap();
        store
            .upsert_attendance(&event.id, "a", AttendanceStatus::Maybe, "")
            .await
            .unwrap();
        let last = store
            .upsert_attendance(&event.id, "a", AttendanceStatus::Absent, "sick")
            .await
            .unwrap();

        let events = store.list_events().await.unwrap();
        let attendees = &events[0].attendees;
        assert_eq!(attendees.len(), 1);
        assert_eq!(attendees[0].status, AttendanceStatus::Absent);
        assert_eq!(attendees[0].comment.as_deref(), Some("sick"));
        assert_eq!(attendees[0].updated_at, last.updated_at);
    }

    #[tokio::test]
    async fn test_two_members_on_one_event() {
        let store = MemoryStore::new();
        member(&store, "a").await;
        member(&store, "b").await;
        let event = store.create_event(&practice()).await.unwrap();

        store
            .upsert_attendance(&event.id, "a", AttendanceStatus::Going, "late")
            .await
            .unwrap();
        store
            .upsert_attendance(&event.id, "b", AttendanceStatus::Absent, "")
            .await
            .unwrap();

        let events = store.list_events().await.unwrap();
        let mut ids: Vec<&str> = events[0].attendees.iter().map(|a| a.user_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_delete_user_keeps_attendance_rows() {
        let store = MemoryStore::new();
        member(&store, "a").await;
        member(&store, "b").await;
        let event = store.create_event(&practice()).await.unwrap();
        store
            .upsert_attendance(&event.id, "a", AttendanceStatus::Going, "")
            .await
            .unwrap();

        store.delete_user("a").await.unwrap();

        let users = store.list_users().await.unwrap();
        assert!(users.iter().all(|u| u.id != "a"));
        let rows = store.attendance_rows(&event.id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_name, "Unknown");
    }

    #[tokio::test]
    async fn test_users_keep_creation_order() {
        let store = MemoryStore::new();
        for id in ["c", "a", "b"] {
            member(&store, id).await;
        }
        let ids: Vec<String> = store
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_offline_store_fails_reads() {
        let store = MemoryStore::with_demo_data(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        store.set_offline(true);
        assert!(store.list_users().await.is_err());
        assert!(store.get_profile("u1").await.is_err());
    }

    #[tokio::test]
    async fn test_demo_data() {
        let store = MemoryStore::with_demo_data(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        let events = store.list_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].count(AttendanceStatus::Going), 2);
        assert_eq!(events[0].attendance_for("u1").map(|a| a.user_name.as_str()), Some("田中 太郎"));
    }
}
