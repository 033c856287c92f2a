pub mod attendance;
pub mod event;
pub mod rows;
pub mod stats;
pub mod time_format;
pub mod user;

pub use attendance::{team_roster, Attendance, AttendanceStatus, RosterEntry, UNKNOWN_MEMBER};
pub use event::{upcoming, EventType, FutsalEvent, NewEvent};
pub use stats::TeamStats;
pub use user::{NewProfile, Role, User, UserUpdate};
