use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::event::FutsalEvent;
use super::user::User;

/// A member's answer for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttendanceStatus {
    Going,
    Maybe,
    Absent,
    Unset,
}

impl AttendanceStatus {
    /// Statuses a member can actively choose
    pub const CHOICES: [AttendanceStatus; 3] = [
        AttendanceStatus::Going,
        AttendanceStatus::Maybe,
        AttendanceStatus::Absent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Going => "GOING",
            AttendanceStatus::Maybe => "MAYBE",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Unset => "UNSET",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AttendanceStatus::Going => "出席",
            AttendanceStatus::Maybe => "未定",
            AttendanceStatus::Absent => "欠席",
            AttendanceStatus::Unset => "回答なし",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GOING" => Ok(AttendanceStatus::Going),
            "MAYBE" => Ok(AttendanceStatus::Maybe),
            "ABSENT" => Ok(AttendanceStatus::Absent),
            "UNSET" | "" => Ok(AttendanceStatus::Unset),
            other => Err(format!("unknown attendance status '{}'", other)),
        }
    }
}

/// One member's attendance for one event, unique per (event_id, user_id)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attendance {
    pub event_id: String,
    pub user_id: String,
    /// Joined from the profile; "Unknown" once the profile is gone
    pub user_name: String,
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Display name for attendance rows whose profile no longer exists
pub const UNKNOWN_MEMBER: &str = "Unknown";

/// Approved member paired with their answer for an event
#[derive(Debug, Clone)]
pub struct RosterEntry<'a> {
    pub user: &'a User,
    pub attendance: Option<&'a Attendance>,
}

/// Every approved member with their attendance (if any) for `event`,
/// in roster order
pub fn team_roster<'a>(event: &'a FutsalEvent, users: &'a [User]) -> Vec<RosterEntry<'a>> {
    users
        .iter()
        .filter(|u| u.is_approved)
        .map(|user| RosterEntry {
            user,
            attendance: event.attendance_for(&user.id),
        })
        .collect()
}
