use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::OrphanPolicy;
use crate::models::attendance::UNKNOWN_MEMBER;
use crate::models::{Attendance, FutsalEvent, TeamStats, User, UserUpdate};

/// Revision captured when a full reload starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadTicket {
    revision: u64,
}

/// Normalized copy of the team's users and events.
///
/// Mutations confirmed by the store are applied one by one and each bumps
/// `revision`. A full reload is only accepted if no mutation landed between
/// `begin_reload` and `apply_snapshot`.
#[derive(Debug, Default)]
pub struct TeamCache {
    users: HashMap<String, User>,
    /// Store order (created_at ascending)
    user_order: Vec<String>,
    events: HashMap<String, FutsalEvent>,
    revision: u64,
    loaded_at: Option<DateTime<Utc>>,
}

impl TeamCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn begin_reload(&self) -> ReloadTicket {
        ReloadTicket {
            revision: self.revision,
        }
    }

    /// Replace everything with a full snapshot unless it went stale.
    /// Returns whether the snapshot was applied.
    pub fn apply_snapshot(
        &mut self,
        ticket: ReloadTicket,
        events: Vec<FutsalEvent>,
        users: Vec<User>,
    ) -> bool {
        if ticket.revision != self.revision {
            info!(
                "Discarding reload from revision {}, cache is at {}",
                ticket.revision, self.revision
            );
            return false;
        }

        self.user_order = users.iter().map(|u| u.id.clone()).collect();
        self.users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        self.events = events.into_iter().map(|e| (e.id.clone(), e)).collect();
        self.revision += 1;
        self.loaded_at = Some(Utc::now());
        debug!(
            "Cache loaded: {} users, {} events",
            self.users.len(),
            self.events.len()
        );
        true
    }

    pub fn apply_event_created(&mut self, event: FutsalEvent) {
        self.events.insert(event.id.clone(), event);
        self.revision += 1;
    }

    /// Upsert one attendance record; returns false if the event is unknown.
    /// A record older than the cached one for the same pair is ignored.
    pub fn apply_attendance(&mut self, attendance: Attendance) -> bool {
        self.revision += 1;
        match self.events.get_mut(&attendance.event_id) {
            Some(event) => {
                let (event_id, user_id) = (attendance.event_id.clone(), attendance.user_id.clone());
                if !event.upsert_attendee(attendance) {
                    debug!("Ignored out-of-order attendance for {} on {}", user_id, event_id);
                }
                true
            }
            None => false,
        }
    }

    pub fn apply_user_added(&mut self, user: User) {
        if !self.users.contains_key(&user.id) {
            self.user_order.push(user.id.clone());
        }
        self.users.insert(user.id.clone(), user);
        self.revision += 1;
    }

    pub fn apply_user_update(&mut self, user_id: &str, update: &UserUpdate) {
        if let Some(user) = self.users.get_mut(user_id) {
            update.apply_to(user);
            if let Some(name) = &update.name {
                for event in self.events.values_mut() {
                    for attendee in event.attendees.iter_mut().filter(|a| a.user_id == user_id) {
                        attendee.user_name = name.clone();
                    }
                }
            }
        }
        self.revision += 1;
    }

    /// Remove a user. Their attendance follows the orphan policy: kept under
    /// the unknown-member name, or dropped.
    pub fn apply_user_deleted(&mut self, user_id: &str, orphans: OrphanPolicy) {
        self.users.remove(user_id);
        self.user_order.retain(|id| id != user_id);
        for event in self.events.values_mut() {
            match orphans {
                OrphanPolicy::Preserve => {
                    for attendee in event.attendees.iter_mut().filter(|a| a.user_id == user_id) {
                        attendee.user_name = UNKNOWN_MEMBER.to_string();
                    }
                }
                OrphanPolicy::Cascade => event.attendees.retain(|a| a.user_id != user_id),
            }
        }
        self.revision += 1;
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    /// All users in store order
    pub fn users(&self) -> Vec<User> {
        self.user_order
            .iter()
            .filter_map(|id| self.users.get(id))
            .cloned()
            .collect()
    }

    pub fn pending_users(&self) -> Vec<User> {
        self.users().into_iter().filter(|u| !u.is_approved).collect()
    }

    pub fn has_admin(&self) -> bool {
        self.users.values().any(User::is_admin)
    }

    pub fn event(&self, event_id: &str) -> Option<&FutsalEvent> {
        self.events.get(event_id)
    }

    /// All events by date, then start time
    pub fn events(&self) -> Vec<FutsalEvent> {
        let mut events: Vec<FutsalEvent> = self.events.values().cloned().collect();
        events.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.start_time.cmp(&b.start_time))
                .then(a.id.cmp(&b.id))
        });
        events
    }

    pub fn stats(&self) -> TeamStats {
        let users: Vec<User> = self.users.values().cloned().collect();
        let events: Vec<FutsalEvent> = self.events.values().cloned().collect();
        TeamStats::compute(&events, &users)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

pub type SharedTeamCache = Arc<tokio::sync::RwLock<TeamCache>>;

pub fn create_shared_team_cache() -> SharedTeamCache {
    Arc::new(tokio::sync::RwLock::new(TeamCache::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceStatus, EventType, NewProfile, Role};
    use chrono::{NaiveDate, NaiveTime};

    fn user(id: &str) -> User {
        let mut user = NewProfile::new(id, &id.to_uppercase(), &format!("{}@example.com", id))
            .into_user();
        user.is_approved = true;
        user
    }

    fn event(id: &str, day: u32) -> FutsalEvent {
        FutsalEvent {
            id: id.to_string(),
            title: format!("Event {}", id),
            event_type: EventType::Practice,
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            location: "Court A".to_string(),
            description: String::new(),
            attendees: Vec::new(),
        }
    }

    fn going(event_id: &str, user_id: &str) -> Attendance {
        Attendance {
            event_id: event_id.to_string(),
            user_id: user_id.to_string(),
            user_name: user_id.to_uppercase(),
            status: AttendanceStatus::Going,
            comment: None,
            updated_at: Utc::now(),
        }
    }

    fn loaded() -> TeamCache {
        let mut cache = TeamCache::new();
        let ticket = cache.begin_reload();
        assert!(cache.apply_snapshot(
            ticket,
            vec![event("e2", 9), event("e1", 2)],
            vec![user("a"), user("b")],
        ));
        cache
    }

    #[test]
    fn test_stale_reload_does_not_overwrite_newer_mutation() {
        let mut cache = loaded();

        let ticket = cache.begin_reload();
        // mutation confirmed while the reload was in flight
        cache.apply_attendance(going("e1", "a"));

        let applied = cache.apply_snapshot(ticket, vec![event("e1", 2)], vec![user("a")]);

        assert!(!applied);
        assert_eq!(cache.event_count(), 2);
        assert_eq!(cache.event("e1").unwrap().attendees.len(), 1);
    }

    #[test]
    fn test_fresh_reload_replaces_everything() {
        let mut cache = loaded();
        let ticket = cache.begin_reload();
        assert!(cache.apply_snapshot(ticket, vec![event("e3", 1)], vec![user("c")]));
        assert_eq!(cache.event_count(), 1);
        assert_eq!(cache.users()[0].id, "c");
    }

    #[test]
    fn test_events_are_in_date_order() {
        let cache = loaded();
        let ids: Vec<String> = cache.events().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[test]
    fn test_attendance_upsert_keeps_one_record() {
        let mut cache = loaded();
        cache.apply_attendance(going("e1", "a"));
        let mut again = going("e1", "a");
        again.status = AttendanceStatus::Absent;
        cache.apply_attendance(again);

        let event = cache.event("e1").unwrap();
        assert_eq!(event.attendees.len(), 1);
        assert_eq!(event.attendees[0].status, AttendanceStatus::Absent);
        assert!(!cache.apply_attendance(going("missing", "a")));
    }

    #[test]
    fn test_older_attendance_arriving_late_is_ignored() {
        let mut cache = loaded();
        let mut newer = going("e1", "a");
        newer.status = AttendanceStatus::Absent;
        let mut older = going("e1", "a");
        older.updated_at = newer.updated_at - chrono::Duration::seconds(5);

        cache.apply_attendance(newer);
        assert!(cache.apply_attendance(older));

        let event = cache.event("e1").unwrap();
        assert_eq!(event.attendees.len(), 1);
        assert_eq!(event.attendees[0].status, AttendanceStatus::Absent);
    }

    #[test]
    fn test_deleted_user_attendance_follows_policy() {
        let mut cache = loaded();
        cache.apply_attendance(going("e1", "a"));
        cache.apply_user_deleted("a", OrphanPolicy::Preserve);
        assert!(cache.user("a").is_none());
        assert_eq!(cache.event("e1").unwrap().attendees[0].user_name, UNKNOWN_MEMBER);

        let mut cache = loaded();
        cache.apply_attendance(going("e1", "a"));
        cache.apply_user_deleted("a", OrphanPolicy::Cascade);
        assert!(cache.event("e1").unwrap().attendees.is_empty());
    }

    #[test]
    fn test_rename_reaches_attendance() {
        let mut cache = loaded();
        cache.apply_attendance(going("e1", "a"));
        cache.apply_user_update(
            "a",
            &UserUpdate {
                name: Some("Alice".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(cache.event("e1").unwrap().attendees[0].user_name, "Alice");
        assert!(!cache.has_admin());
        cache.apply_user_update("b", &UserUpdate::role(Role::Admin));
        assert!(cache.has_admin());
    }
}
