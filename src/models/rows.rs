//! Row shapes of the hosted relational schema.
//!
//! Tables use snake_case columns; these types are the only place that knows
//! the column names. Conversion into the domain types happens here too.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::attendance::UNKNOWN_MEMBER;
use super::user::non_empty;
use super::{Attendance, AttendanceStatus, EventType, FutsalEvent, NewEvent, NewProfile, Role, User, UserUpdate};

/// Row of the `profiles` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for User {
    fn from(row: ProfileRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role,
            position: row.position.filter(|p| !p.is_empty()),
            avatar: row.avatar.filter(|a| !a.is_empty()),
            is_approved: row.is_approved,
        }
    }
}

impl From<NewProfile> for ProfileRow {
    fn from(profile: NewProfile) -> Self {
        ProfileRow {
            id: profile.id,
            name: profile.name,
            email: profile.email,
            role: Role::Member,
            position: None,
            avatar: profile.avatar,
            is_approved: false,
            created_at: None,
        }
    }
}

/// PATCH body for `profiles`; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// `Some(None)` writes NULL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_approved: Option<bool>,
}

impl From<&UserUpdate> for ProfilePatch {
    fn from(update: &UserUpdate) -> Self {
        ProfilePatch {
            name: update.name.clone(),
            email: update.email.clone(),
            role: update.role,
            position: update.position.as_deref().map(non_empty),
            avatar: update.avatar.as_deref().map(non_empty),
            is_approved: update.is_approved,
        }
    }
}

/// Row of the `events` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub date: NaiveDate,
    #[serde(with = "super::time_format")]
    pub start_time: NaiveTime,
    #[serde(with = "super::time_format")]
    pub end_time: NaiveTime,
    pub location: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl EventRow {
    pub fn into_event(self, attendees: Vec<Attendance>) -> FutsalEvent {
        FutsalEvent {
            id: self.id,
            title: self.title,
            event_type: self.event_type,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            description: self.description.unwrap_or_default(),
            attendees,
        }
    }
}

/// INSERT body for `events`; the id is assigned by the store
#[derive(Debug, Clone, Serialize)]
pub struct NewEventRow {
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub date: NaiveDate,
    #[serde(with = "super::time_format")]
    pub start_time: NaiveTime,
    #[serde(with = "super::time_format")]
    pub end_time: NaiveTime,
    pub location: String,
    pub description: String,
}

impl From<&NewEvent> for NewEventRow {
    fn from(event: &NewEvent) -> Self {
        NewEventRow {
            title: event.title.trim().to_string(),
            event_type: event.event_type,
            date: event.date,
            start_time: event.start_time,
            end_time: event.end_time,
            location: event.location.trim().to_string(),
            description: event.description.clone(),
        }
    }
}

/// Embedded `profiles (name)` of an attendance select
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileName {
    pub name: String,
}

/// Row of the `attendance` table joined with the member's profile name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRow {
    pub event_id: String,
    pub user_id: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub comment: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub profiles: Option<ProfileName>,
}

impl From<AttendanceRow> for Attendance {
    fn from(row: AttendanceRow) -> Self {
        Attendance {
            event_id: row.event_id,
            user_id: row.user_id,
            user_name: row
                .profiles
                .map(|p| p.name)
                .unwrap_or_else(|| UNKNOWN_MEMBER.to_string()),
            status: row.status,
            comment: row.comment.filter(|c| !c.is_empty()),
            updated_at: row.updated_at,
        }
    }
}

/// UPSERT body for `attendance`, conflict target (event_id, user_id)
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceUpsertRow {
    pub event_id: String,
    pub user_id: String,
    pub status: AttendanceStatus,
    pub comment: String,
    pub updated_at: DateTime<Utc>,
}
