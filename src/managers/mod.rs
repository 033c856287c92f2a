pub mod member_manager;
pub mod permission_checker;
pub mod team_manager;

pub use member_manager::{create_shared_member_manager, MemberManager, SharedMemberManager};
pub use team_manager::{create_shared_team_manager, SharedTeamManager, TeamManager};
