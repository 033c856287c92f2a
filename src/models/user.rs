use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Team role of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
        }
    }

    /// The other role, used by the roster's role toggle
    pub fn toggled(self) -> Self {
        match self {
            Role::Admin => Role::Member,
            Role::Member => Role::Admin,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MEMBER" => Ok(Role::Member),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// A team member profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,

    /// Playing position (ALA, PIVO, FIXO, GOLEIRO, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    /// Approval gate: unapproved users only ever see the pending screen
    pub is_approved: bool,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Avatar URL, falling back to a generated placeholder seeded by id
    pub fn avatar_url(&self) -> String {
        match self.avatar.as_deref() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => placeholder_avatar(&self.id),
        }
    }
}

pub fn placeholder_avatar(seed: &str) -> String {
    format!(
        "https://picsum.photos/seed/{}/100/100",
        urlencoding::encode(seed)
    )
}

/// Profile created at sign-up. Always starts as an unapproved MEMBER.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

impl NewProfile {
    pub fn new(id: &str, name: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            avatar: Some(placeholder_avatar(email.trim())),
        }
    }

    pub fn into_user(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: Role::Member,
            position: None,
            avatar: self.avatar,
            is_approved: false,
        }
    }
}

/// Partial update of a user; only `Some` fields are written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub position: Option<String>,
    pub avatar: Option<String>,
    pub is_approved: Option<bool>,
}

impl UserUpdate {
    pub fn approve() -> Self {
        Self {
            is_approved: Some(true),
            ..Default::default()
        }
    }

    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Trim every text field. A blank position or avatar stays `Some("")`,
    /// which clears the column.
    pub fn normalized(self) -> Self {
        let trim = |value: Option<String>| value.map(|v| v.trim().to_string());
        Self {
            name: trim(self.name),
            email: trim(self.email),
            position: trim(self.position),
            avatar: trim(self.avatar),
            ..self
        }
    }

    /// Apply the present fields to a cached copy of the user
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(position) = &self.position {
            user.position = non_empty(position);
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = non_empty(avatar);
        }
        if let Some(approved) = self.is_approved {
            user.is_approved = approved;
        }
    }
}

/// Trimmed value, or `None` when blank
pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member() -> User {
        NewProfile::new("u9", "山田 花子", "yamada@example.com").into_user()
    }

    #[test]
    fn test_new_profile_is_unapproved_member() {
        let user = member();
        assert_eq!(user.role, Role::Member);
        assert!(!user.is_approved);
        assert_eq!(
            user.avatar.as_deref(),
            Some("https://picsum.photos/seed/yamada%40example.com/100/100")
        );
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let mut user = member();
        let update = UserUpdate {
            position: Some("PIVO".to_string()),
            is_approved: Some(true),
            ..Default::default()
        };
        update.apply_to(&mut user);

        assert_eq!(user.name, "山田 花子");
        assert_eq!(user.position.as_deref(), Some("PIVO"));
        assert!(user.is_approved);
    }

    #[test]
    fn test_blank_position_clears_it() {
        let mut user = member();
        user.position = Some("FIXO".to_string());
        UserUpdate {
            position: Some("  ".to_string()),
            ..Default::default()
        }
        .apply_to(&mut user);
        assert_eq!(user.position, None);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(Role::Admin.toggled(), Role::Member);
        assert!("captain".parse::<Role>().is_err());
    }
}
