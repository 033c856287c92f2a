use serde::Serialize;

use super::{AttendanceStatus, FutsalEvent, User};

/// Summary numbers shown on the admin panel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TeamStats {
    pub total_events: usize,
    /// Approved members
    pub active_members: usize,
    /// Mean number of GOING answers per event
    pub average_attendance: f64,
}

impl TeamStats {
    pub fn compute(events: &[FutsalEvent], users: &[User]) -> Self {
        let going: usize = events
            .iter()
            .map(|e| e.count(AttendanceStatus::Going))
            .sum();
        let average_attendance = if events.is_empty() {
            0.0
        } else {
            going as f64 / events.len() as f64
        };

        Self {
            total_events: events.len(),
            active_members: users.iter().filter(|u| u.is_approved).count(),
            average_attendance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attendance, EventType, NewEvent, NewProfile};
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn event(id: &str, answers: &[AttendanceStatus]) -> FutsalEvent {
        let mut event = NewEvent {
            title: "Practice".to_string(),
            event_type: EventType::Practice,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            location: "Gym".to_string(),
            description: String::new(),
        }
        .into_event(id.to_string());
        for (i, status) in answers.iter().enumerate() {
            event.attendees.push(Attendance {
                event_id: id.to_string(),
                user_id: format!("u{}", i),
                user_name: format!("Player {}", i),
                status: *status,
                comment: None,
                updated_at: Utc::now(),
            });
        }
        event
    }

    fn user(id: &str, approved: bool) -> User {
        let mut user = NewProfile::new(id, id, &format!("{}@example.com", id)).into_user();
        user.is_approved = approved;
        user
    }

    #[test]
    fn test_empty_team() {
        let stats = TeamStats::compute(&[], &[]);
        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.average_attendance, 0.0);
    }

    #[test]
    fn test_counts_only_going_and_approved() {
        use AttendanceStatus::*;
        let events = [
            event("e1", &[Going, Going, Absent]),
            event("e2", &[Going, Maybe, Unset]),
        ];
        let users = [user("a", true), user("b", true), user("c", false)];

        let stats = TeamStats::compute(&events, &users);
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.active_members, 2);
        assert_eq!(stats.average_attendance, 1.5);
    }
}
