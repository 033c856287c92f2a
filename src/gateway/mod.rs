//! Remote data gateway
//!
//! Typed CRUD operations over the team's relational store. Every operation
//! returns an explicit `Result`: an empty collection means "no rows", a
//! failed request is always an `Err`.

mod memory;
mod merge;
mod supabase;

pub use memory::MemoryStore;
pub use merge::merge_attendance;
pub use supabase::SupabaseStore;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Attendance, AttendanceStatus, FutsalEvent, NewEvent, NewProfile, User, UserUpdate};

#[async_trait]
pub trait TeamStore: Send + Sync {
    /// All profiles, oldest first
    async fn list_users(&self) -> Result<Vec<User>>;

    /// A single profile; `Ok(None)` when no row exists
    async fn get_profile(&self, user_id: &str) -> Result<Option<User>>;

    /// Insert the profile row of a freshly signed-up user
    async fn create_profile(&self, profile: NewProfile) -> Result<User>;

    async fn update_user(&self, user_id: &str, update: &UserUpdate) -> Result<()>;

    /// Remove a profile. Attendance rows of the user are not touched.
    async fn delete_user(&self, user_id: &str) -> Result<()>;

    /// All events in date order with their attendees
    async fn list_events(&self) -> Result<Vec<FutsalEvent>>;

    async fn create_event(&self, event: &NewEvent) -> Result<FutsalEvent>;

    /// Insert or overwrite the record for (event_id, user_id)
    async fn upsert_attendance(
        &self,
        event_id: &str,
        user_id: &str,
        status: AttendanceStatus,
        comment: &str,
    ) -> Result<Attendance>;

    /// Remove every attendance row of a user, returning how many were removed
    async fn delete_attendance_for_user(&self, user_id: &str) -> Result<usize>;
}

pub type SharedTeamStore = Arc<dyn TeamStore>;
