use std::str::FromStr;

/// Whether an authenticated user may promote themself to ADMIN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootstrapPolicy {
    /// Nobody can self-promote; the first admin is set in the store directly
    #[default]
    Disabled,
    /// Self-promotion to ADMIN+approved is allowed while no ADMIN exists
    FirstAdmin,
}

impl FromStr for BootstrapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "false" | "" => Ok(BootstrapPolicy::Disabled),
            "first-admin" | "on" | "true" => Ok(BootstrapPolicy::FirstAdmin),
            other => Err(format!("unknown bootstrap policy '{}'", other)),
        }
    }
}

/// What happens to a user's attendance rows when the user is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Rows stay and are shown under the "Unknown" member name
    #[default]
    Preserve,
    /// Rows are deleted before the profile
    Cascade,
}

impl FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" | "" => Ok(OrphanPolicy::Preserve),
            "cascade" => Ok(OrphanPolicy::Cascade),
            other => Err(format!("unknown orphan policy '{}'", other)),
        }
    }
}

/// Team rules that the product owner has to decide on explicitly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeamPolicy {
    pub bootstrap: BootstrapPolicy,
    pub orphans: OrphanPolicy,
}
