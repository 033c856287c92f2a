pub mod team_cache;

pub use team_cache::{create_shared_team_cache, ReloadTicket, SharedTeamCache, TeamCache};
