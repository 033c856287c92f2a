use std::collections::HashMap;
use tracing::debug;

use crate::models::rows::{AttendanceRow, EventRow};
use crate::models::{Attendance, FutsalEvent};

/// Attach attendance rows to their events.
///
/// Rows are grouped by event id in one pass, so the merge is linear in
/// events + rows. Event order is preserved; rows pointing at an event that is
/// not in `events` are dropped.
pub fn merge_attendance(events: Vec<EventRow>, rows: Vec<AttendanceRow>) -> Vec<FutsalEvent> {
    let mut by_event: HashMap<String, Vec<Attendance>> = HashMap::with_capacity(events.len());
    for row in rows {
        by_event
            .entry(row.event_id.clone())
            .or_default()
            .push(row.into());
    }

    let merged: Vec<FutsalEvent> = events
        .into_iter()
        .map(|event| {
            let attendees = by_event.remove(&event.id).unwrap_or_default();
            event.into_event(attendees)
        })
        .collect();

    if !by_event.is_empty() {
        let dropped: usize = by_event.values().map(Vec::len).sum();
        debug!("Dropped {} attendance rows without a matching event", dropped);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rows::ProfileName;
    use crate::models::{AttendanceStatus, EventType};
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn event_row(id: &str) -> EventRow {
        EventRow {
            id: id.to_string(),
            title: format!("Event {}", id),
            event_type: EventType::Practice,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            location: "Court A".to_string(),
            description: None,
        }
    }

    fn row(event_id: &str, user_id: &str) -> AttendanceRow {
        AttendanceRow {
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            status: AttendanceStatus::Going,
            comment: None,
            updated_at: Utc::now(),
            profiles: Some(ProfileName {
                name: user_id.to_string(),
            }),
        }
    }

    #[test]
    fn test_attendees_match_rows_per_event() {
        let events = vec![event_row("e1"), event_row("e2"), event_row("e3")];
        let rows = vec![row("e1", "u1"), row("e2", "u1"), row("e1", "u2"), row("e9", "u3")];

        let merged = merge_attendance(events, rows);

        assert_eq!(merged.len(), 3);
        let ids: Vec<&str> = merged.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2", "e3"]);

        let mut e1: Vec<&str> = merged[0].attendees.iter().map(|a| a.user_id.as_str()).collect();
        e1.sort();
        assert_eq!(e1, vec!["u1", "u2"]);
        assert_eq!(merged[1].attendees.len(), 1);
        assert!(merged[2].attendees.is_empty());
        assert!(merged
            .iter()
            .flat_map(|e| e.attendees.iter())
            .all(|a| a.user_id != "u3"));
    }
}
