use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::attendance::{Attendance, AttendanceStatus};
use crate::error::{AppError, Result};

/// Kind of team event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Match,
    Practice,
    Social,
    Other,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::Match,
        EventType::Practice,
        EventType::Social,
        EventType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Match => "MATCH",
            EventType::Practice => "PRACTICE",
            EventType::Social => "SOCIAL",
            EventType::Other => "OTHER",
        }
    }

    /// Display label used in the views
    pub fn label(&self) -> &'static str {
        match self {
            EventType::Match => "試合",
            EventType::Practice => "練習",
            EventType::Social => "交流会",
            EventType::Other => "その他",
        }
    }

    /// Accent color for cards and calendar chips
    pub fn color(&self) -> &'static str {
        match self {
            EventType::Match => "#ef4444",
            EventType::Practice => "#3b82f6",
            EventType::Social => "#10b981",
            EventType::Other => "#64748b",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MATCH" => Ok(EventType::Match),
            "PRACTICE" => Ok(EventType::Practice),
            "SOCIAL" => Ok(EventType::Social),
            "OTHER" => Ok(EventType::Other),
            other => Err(format!("unknown event type '{}'", other)),
        }
    }
}

/// A scheduled team event with its attendance records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FutsalEvent {
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
    pub description: String,
    pub attendees: Vec<Attendance>,
}

impl FutsalEvent {
    /// Number of attendees that answered with `status`
    pub fn count(&self, status: AttendanceStatus) -> usize {
        self.attendees.iter().filter(|a| a.status == status).count()
    }

    pub fn attendance_for(&self, user_id: &str) -> Option<&Attendance> {
        self.attendees.iter().find(|a| a.user_id == user_id)
    }

    /// Names of the members answering GOING
    pub fn going_names(&self) -> Vec<&str> {
        self.attendees
            .iter()
            .filter(|a| a.status == AttendanceStatus::Going)
            .map(|a| a.user_name.as_str())
            .collect()
    }

    /// Insert or replace the record for the attendance's user. An incoming
    /// record older than the one held is ignored; returns whether it was kept.
    pub fn upsert_attendee(&mut self, attendance: Attendance) -> bool {
        match self
            .attendees
            .iter_mut()
            .find(|a| a.user_id == attendance.user_id)
        {
            Some(existing) if existing.updated_at > attendance.updated_at => false,
            Some(existing) => {
                *existing = attendance;
                true
            }
            None => {
                self.attendees.push(attendance);
                true
            }
        }
    }
}

/// Events on or after `today`, in date order
pub fn upcoming(events: &[FutsalEvent], today: NaiveDate) -> Vec<&FutsalEvent> {
    let mut list: Vec<&FutsalEvent> = events.iter().filter(|e| e.date >= today).collect();
    list.sort_by(|a, b| a.date.cmp(&b.date).then(a.start_time.cmp(&b.start_time)));
    list
}

/// Fields of an event to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub event_type: EventType,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: String,
    pub description: String,
}

impl NewEvent {
    /// Required-field check performed before anything is sent
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() || self.location.trim().is_empty() {
            return Err(AppError::validation("タイトルと場所を入力してください"));
        }
        Ok(())
    }

    pub fn into_event(self, id: String) -> FutsalEvent {
        FutsalEvent {
            id,
            title: self.title.trim().to_string(),
            event_type: self.event_type,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location.trim().to_string(),
            description: self.description,
            attendees: Vec::new(),
        }
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

    #[test]
    fn test_validate_requires_title_and_location() {
        assert!(practice().validate().is_ok());

        let mut missing_title = practice();
        missing_title.title = "   ".to_string();
        assert!(matches!(
            missing_title.validate(),
            Err(AppError::Validation { .. })
        ));

        let mut missing_location = practice();
        missing_location.location = String::new();
        assert!(missing_location.validate().is_err());
    }

    #[test]
    fn test_session_past_midnight_is_valid() {
        let mut late = practice();
        late.start_time = time_format::parse("22:00").unwrap();
        late.end_time = time_format::parse("00:30").unwrap();
        assert!(late.validate().is_ok());
    }

    #[test]
    fn test_upcoming_filters_past_events() {
        let past = practice().into_event("e1".to_string());
        let mut future = practice().into_event("e2".to_string());
        future.date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();

        let events = vec![future.clone(), past];
        let list = upcoming(&events, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "e2");
    }

    #[test]
    fn test_event_type_labels() {
        assert_eq!(EventType::Match.label(), "試合");
        assert_eq!("social".parse::<EventType>(), Ok(EventType::Social));
    }
}
