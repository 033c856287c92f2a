use std::sync::Arc;
use tracing::{info, warn};

use super::permission_checker::require_approved;
use crate::error::{AppError, Result};
use crate::gateway::SharedTeamStore;
use crate::models::{Attendance, AttendanceStatus, FutsalEvent, NewEvent, User};
use crate::state::SharedTeamCache;

/// Events, attendance and full reloads of the team cache
pub struct TeamManager {
    store: SharedTeamStore,
    cache: SharedTeamCache,
}

impl TeamManager {
    pub fn new(store: SharedTeamStore, cache: SharedTeamCache) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &SharedTeamCache {
        &self.cache
    }

    /// Reload users and events from the store.
    ///
    /// Returns `Ok(false)` when a mutation was applied while the reload was
    /// in flight and the snapshot was discarded.
    pub async fn refresh(&self) -> Result<bool> {
        let ticket = self.cache.read().await.begin_reload();
        let (events, users) =
            futures::future::try_join(self.store.list_events(), self.store.list_users()).await?;

        let mut cache = self.cache.write().await;
        let applied = cache.apply_snapshot(ticket, events, users);
        if applied {
            info!(
                "Team cache refreshed: {} users, {} events",
                cache.user_count(),
                cache.event_count()
            );
        }
        Ok(applied)
    }

    /// Load the cache on first use
    pub async fn ensure_loaded(&self) -> Result<()> {
        if self.cache.read().await.is_loaded() {
            return Ok(());
        }
        self.refresh().await.map(|_| ())
    }

    pub async fn create_event(&self, actor: &User, event: NewEvent) -> Result<FutsalEvent> {
        require_approved(actor)?;
        event.validate()?;

        let created = self.store.create_event(&event).await?;
        info!(
            "{} created {} event '{}' on {}",
            actor.name,
            created.event_type,
            created.title,
            created.date
        );
        self.cache.write().await.apply_event_created(created.clone());
        Ok(created)
    }

    /// Record the actor's own answer for an event
    pub async fn update_attendance(
        &self,
        actor: &User,
        event_id: &str,
        status: AttendanceStatus,
        comment: &str,
    ) -> Result<Attendance> {
        require_approved(actor)?;
        if status == AttendanceStatus::Unset {
            return Err(AppError::validation("出欠ステータスを選択してください。"));
        }
        if self.cache.read().await.event(event_id).is_none() {
            return Err(AppError::not_found("event", event_id));
        }

        let mut attendance = self
            .store
            .upsert_attendance(event_id, &actor.id, status, comment.trim())
            .await?;
        // the upsert answer carries no joined profile
        attendance.user_name = actor.name.clone();

        if !self.cache.write().await.apply_attendance(attendance.clone()) {
            warn!("Attendance for {} stored but event left the cache", event_id);
        }
        Ok(attendance)
    }

    pub async fn event(&self, event_id: &str) -> Option<FutsalEvent> {
        self.cache.read().await.event(event_id).cloned()
    }
}

pub type SharedTeamManager = Arc<TeamManager>;

pub fn create_shared_team_manager(
    store: SharedTeamStore,
    cache: SharedTeamCache,
) -> SharedTeamManager {
    Arc::new(TeamManager::new(store, cache))
}
