use std::sync::Arc;
use tracing::{error, info, warn};

use super::permission_checker::{
    can_bootstrap, check_delete, check_edit, require_admin, require_approved,
};
use crate::auth::{AuthSession, SharedAuthProvider, MIN_PASSWORD_LEN};
use crate::config::{OrphanPolicy, TeamPolicy};
use crate::error::{AppError, Result};
use crate::gateway::SharedTeamStore;
use crate::models::{NewProfile, Role, User, UserUpdate};
use crate::state::SharedTeamCache;

/// Sign-up, approval and profile edits
pub struct MemberManager {
    store: SharedTeamStore,
    auth: SharedAuthProvider,
    cache: SharedTeamCache,
    policy: TeamPolicy,
}

impl MemberManager {
    pub fn new(
        store: SharedTeamStore,
        auth: SharedAuthProvider,
        cache: SharedTeamCache,
        policy: TeamPolicy,
    ) -> Self {
        Self {
            store,
            auth,
            cache,
            policy,
        }
    }

    pub fn policy(&self) -> TeamPolicy {
        self.policy
    }

    /// Create the auth account and the (unapproved) profile row
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<User> {
        if name.trim().is_empty() || email.trim().is_empty() {
            return Err(AppError::validation("名前とメールアドレスを入力してください。"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "パスワードは{}文字以上で入力してください。",
                MIN_PASSWORD_LEN
            )));
        }

        let user_id = self.auth.sign_up(name.trim(), email.trim(), password).await?;
        let user = self
            .store
            .create_profile(NewProfile::new(&user_id, name, email))
            .await
            .map_err(|e| {
                error!("Profile creation for {} failed: {}", user_id, e);
                e
            })?;

        info!("New member {} ({}) is waiting for approval", user.name, user.id);
        self.cache.write().await.apply_user_added(user.clone());
        Ok(user)
    }

    pub async fn approve(&self, actor: &User, user_id: &str) -> Result<()> {
        require_admin(actor)?;
        let update = UserUpdate::approve();
        self.store.update_user(user_id, &update).await?;
        info!("{} approved user {}", actor.name, user_id);
        self.cache.write().await.apply_user_update(user_id, &update);
        Ok(())
    }

    /// Reject a pending sign-up; same effect as deleting the profile
    pub async fn reject(&self, actor: &User, user_id: &str) -> Result<()> {
        self.delete(actor, user_id).await
    }

    /// Delete a profile. Attendance rows follow the orphan policy.
    pub async fn delete(&self, actor: &User, user_id: &str) -> Result<()> {
        check_delete(actor, user_id)?;

        if self.policy.orphans == OrphanPolicy::Cascade {
            let removed = self.store.delete_attendance_for_user(user_id).await?;
            info!("Removed {} attendance rows of user {}", removed, user_id);
        }
        self.store.delete_user(user_id).await?;
        info!("{} deleted user {}", actor.name, user_id);

        self.cache
            .write()
            .await
            .apply_user_deleted(user_id, self.policy.orphans);
        Ok(())
    }

    /// Edit another user's profile (admin) or one's own name/email.
    /// Returns the updated user.
    pub async fn update_user(&self, actor: &User, user_id: &str, update: UserUpdate) -> Result<User> {
        check_edit(actor, user_id)?;
        let restricted = update.role.is_some() || update.is_approved.is_some();
        if restricted {
            require_admin(actor)?;
        }
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("名前を入力してください。"));
            }
        }
        let loses_admin = update.role == Some(Role::Member) || update.is_approved == Some(false);
        if loses_admin && self.is_approved_admin(user_id).await {
            self.ensure_other_admin(user_id).await?;
        }

        let update = update.normalized();
        if !update.is_empty() {
            self.store.update_user(user_id, &update).await?;
        }

        let mut cache = self.cache.write().await;
        cache.apply_user_update(user_id, &update);
        cache
            .user(user_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("user", user_id))
    }

    /// Flip ADMIN <-> MEMBER
    pub async fn toggle_role(&self, actor: &User, user_id: &str) -> Result<User> {
        require_admin(actor)?;
        let current = self
            .cache
            .read()
            .await
            .user(user_id)
            .map(|u| u.role)
            .ok_or_else(|| AppError::not_found("user", user_id))?;
        self.update_user(actor, user_id, UserUpdate::role(current.toggled()))
            .await
    }

    /// Settings screen: own name and email
    pub async fn update_settings(&self, actor: &User, name: &str, email: &str) -> Result<User> {
        require_approved(actor)?;
        if email.trim().is_empty() {
            return Err(AppError::validation("メールアドレスを入力してください。"));
        }
        let update = UserUpdate {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            ..Default::default()
        };
        self.update_user(actor, &actor.id, update).await
    }

    pub async fn change_password(
        &self,
        actor: &User,
        session: &AuthSession,
        new_password: &str,
    ) -> Result<()> {
        require_approved(actor)?;
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "パスワードは{}文字以上で入力してください。",
                MIN_PASSWORD_LEN
            )));
        }
        self.auth.update_password(session, new_password).await
    }

    /// Whether the bootstrap action should be offered to a pending user
    pub async fn bootstrap_available(&self) -> bool {
        can_bootstrap(self.policy.bootstrap, &self.cache.read().await.users())
    }

    /// Promote the actor to an approved ADMIN while the team has no admin.
    ///
    /// Admin presence is checked against the store, not the cache.
    pub async fn bootstrap_admin(&self, actor: &User) -> Result<User> {
        let users = self.store.list_users().await?;
        if !can_bootstrap(self.policy.bootstrap, &users) {
            warn!("Refused admin bootstrap for {}", actor.id);
            return Err(AppError::permission_denied("admin bootstrap is not available"));
        }

        let update = UserUpdate {
            role: Some(Role::Admin),
            is_approved: Some(true),
            ..Default::default()
        };
        self.store.update_user(&actor.id, &update).await?;
        warn!("User {} ({}) promoted themself to ADMIN", actor.name, actor.id);

        let mut promoted = actor.clone();
        update.apply_to(&mut promoted);
        let mut cache = self.cache.write().await;
        if cache.user(&actor.id).is_none() {
            cache.apply_user_added(promoted.clone());
        } else {
            cache.apply_user_update(&actor.id, &update);
        }
        Ok(promoted)
    }

    async fn is_approved_admin(&self, user_id: &str) -> bool {
        self.cache
            .read()
            .await
            .user(user_id)
            .map_or(false, |u| u.is_admin() && u.is_approved)
    }

    /// The team must keep at least one approved admin
    async fn ensure_other_admin(&self, demoted_id: &str) -> Result<()> {
        let cache = self.cache.read().await;
        let others = cache
            .users()
            .iter()
            .filter(|u| u.id != demoted_id && u.is_admin() && u.is_approved)
            .count();
        if others == 0 {
            return Err(AppError::validation(
                "管理者が1人もいなくなるため、権限を変更できません。",
            ));
        }
        Ok(())
    }
}

pub type SharedMemberManager = Arc<MemberManager>;

pub fn create_shared_member_manager(
    store: SharedTeamStore,
    auth: SharedAuthProvider,
    cache: SharedTeamCache,
    policy: TeamPolicy,
) -> SharedMemberManager {
    Arc::new(MemberManager::new(store, auth, cache, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthProvider, MemoryAuth};
    use crate::config::BootstrapPolicy;
    use crate::gateway::{MemoryStore, TeamStore};
    use crate::managers::TeamManager;
    use crate::models::{AttendanceStatus, NewEvent, EventType, time_format};
    use crate::state::create_shared_team_cache;
    use chrono::NaiveDate;

    struct Fixture {
        store: Arc<MemoryStore>,
        auth: Arc<MemoryAuth>,
        members: MemberManager,
        team: TeamManager,
    }

    async fn fixture(policy: TeamPolicy, demo: bool) -> Fixture {
        let store = Arc::new(if demo {
            MemoryStore::with_demo_data(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        } else {
            MemoryStore::new()
        });
        let auth = Arc::new(MemoryAuth::new());
        let cache = create_shared_team_cache();
        let team = TeamManager::new(store.clone(), cache.clone());
        team.refresh().await.unwrap();
        let members = MemberManager::new(store.clone(), auth.clone(), cache, policy);
        Fixture {
            store,
            auth,
            members,
            team,
        }
    }

    async fn user(fixture: &Fixture, id: &str) -> User {
        fixture.store.get_profile(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_creates_pending_member() {
        let f = fixture(TeamPolicy::default(), false).await;
        let user = f
            .members
            .sign_up("山田 花子", "yamada@example.com", "secret1")
            .await
            .unwrap();

        assert_eq!(user.role, Role::Member);
        assert!(!user.is_approved);
        assert_eq!(f.members.cache.read().await.pending_users().len(), 1);
        assert!(f.auth.sign_in("yamada@example.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn test_approve_requires_admin() {
        let f = fixture(TeamPolicy::default(), true).await;
        let pending = f
            .members
            .sign_up("New", "new@example.com", "secret1")
            .await
            .unwrap();

        let member = user(&f, "u2").await;
        assert!(f.members.approve(&member, &pending.id).await.is_err());

        let admin = user(&f, "u1").await;
        f.members.approve(&admin, &pending.id).await.unwrap();
        assert!(user(&f, &pending.id).await.is_approved);
        assert!(f.members.cache.read().await.pending_users().is_empty());
    }

    #[tokio::test]
    async fn test_delete_preserves_attendance_by_default() {
        let f = fixture(TeamPolicy::default(), true).await;
        let admin = user(&f, "u1").await;

        f.members.delete(&admin, "u2").await.unwrap();

        assert!(f.store.list_users().await.unwrap().iter().all(|u| u.id != "u2"));
        let rows = f.store.attendance_rows("e1");
        let orphan = rows.iter().find(|a| a.user_id == "u2").unwrap();
        assert_eq!(orphan.user_name, "Unknown");
        let cached = f.team.event("e1").await.unwrap();
        assert_eq!(cached.attendance_for("u2").unwrap().user_name, "Unknown");
    }

    #[tokio::test]
    async fn test_delete_cascades_when_configured() {
        let policy = TeamPolicy {
            orphans: OrphanPolicy::Cascade,
            ..Default::default()
        };
        let f = fixture(policy, true).await;
        let admin = user(&f, "u1").await;

        f.members.delete(&admin, "u2").await.unwrap();

        assert!(f.store.attendance_rows("e1").iter().all(|a| a.user_id != "u2"));
        assert!(f.team.event("e1").await.unwrap().attendance_for("u2").is_none());
    }

    #[tokio::test]
    async fn test_admin_cannot_delete_self() {
        let f = fixture(TeamPolicy::default(), true).await;
        let admin = user(&f, "u1").await;
        assert!(f.members.delete(&admin, "u1").await.is_err());
        assert!(f.store.get_profile("u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_member_cannot_change_own_role() {
        let f = fixture(TeamPolicy::default(), true).await;
        let member = user(&f, "u2").await;
        let err = f
            .members
            .update_user(&member, "u2", UserUpdate::role(Role::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_toggle_role_keeps_one_admin() {
        let f = fixture(TeamPolicy::default(), true).await;
        let admin = user(&f, "u1").await;

        assert!(f.members.toggle_role(&admin, "u1").await.is_err());
        let promoted = f.members.toggle_role(&admin, "u3").await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
        let demoted = f.members.toggle_role(&admin, "u1").await.unwrap();
        assert_eq!(demoted.role, Role::Member);
    }

    #[tokio::test]
    async fn test_last_admin_cannot_be_unapproved() {
        let f = fixture(TeamPolicy::default(), true).await;
        let admin = user(&f, "u1").await;
        let update = UserUpdate {
            is_approved: Some(false),
            ..Default::default()
        };

        let err = f.members.update_user(&admin, "u1", update).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(user(&f, "u1").await.is_approved);
    }

    #[tokio::test]
    async fn test_settings_rename_reaches_attendance() {
        let f = fixture(TeamPolicy::default(), true).await;
        let member = user(&f, "u2").await;

        let updated = f
            .members
            .update_settings(&member, " 佐藤 健二 ", "sato@example.com")
            .await
            .unwrap();
        assert_eq!(updated.name, "佐藤 健二");
        let event = f.team.event("e1").await.unwrap();
        assert_eq!(event.attendance_for("u2").unwrap().user_name, "佐藤 健二");
    }

    #[tokio::test]
    async fn test_bootstrap_refused_when_disabled() {
        let f = fixture(TeamPolicy::default(), false).await;
        let pending = f
            .members
            .sign_up("First", "first@example.com", "secret1")
            .await
            .unwrap();
        assert!(!f.members.bootstrap_available().await);
        assert!(f.members.bootstrap_admin(&pending).await.is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_only_while_no_admin_exists() {
        let policy = TeamPolicy {
            bootstrap: BootstrapPolicy::FirstAdmin,
            ..Default::default()
        };
        let f = fixture(policy, false).await;
        let first = f
            .members
            .sign_up("First", "first@example.com", "secret1")
            .await
            .unwrap();
        let second = f
            .members
            .sign_up("Second", "second@example.com", "secret1")
            .await
            .unwrap();

        assert!(f.members.bootstrap_available().await);
        let promoted = f.members.bootstrap_admin(&first).await.unwrap();
        assert!(promoted.is_admin() && promoted.is_approved);

        assert!(f.members.bootstrap_admin(&second).await.is_err());
        assert!(!f.members.bootstrap_available().await);
    }

    #[tokio::test]
    async fn test_attendance_after_approval() {
        let f = fixture(TeamPolicy::default(), true).await;
        let admin = user(&f, "u1").await;
        let pending = f
            .members
            .sign_up("New", "new@example.com", "secret1")
            .await
            .unwrap();
        let event = NewEvent {
            title: "Practice".to_string(),
            event_type: EventType::Practice,
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            start_time: time_format::parse("19:00").unwrap(),
            end_time: time_format::parse("21:00").unwrap(),
            location: "Court A".to_string(),
            description: String::new(),
        };
        let created = f.team.create_event(&admin, event).await.unwrap();

        assert!(f
            .team
            .update_attendance(&pending, &created.id, AttendanceStatus::Going, "")
            .await
            .is_err());

        f.members.approve(&admin, &pending.id).await.unwrap();
        let approved = user(&f, &pending.id).await;
        f.team
            .update_attendance(&approved, &created.id, AttendanceStatus::Going, "")
            .await
            .unwrap();
    }
}
