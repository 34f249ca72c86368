use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Member,
    Moderator,
    Admin,
}

impl UserRole {
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Moderator | Self::Admin)
    }
}

impl FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "member" => Ok(Self::Member),
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Member => write!(f, "member"),
            Self::Moderator => write!(f, "moderator"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: u32,
    pub username: String,
    pub role: UserRole,
    pub created_at: String,
}

/// Whoever is making the current request.
#[derive(Debug, Clone, Default)]
pub enum Visitor {
    #[default]
    Guest,
    User(User),
}

impl Visitor {
    pub fn user_id(&self) -> u32 {
        match self {
            Self::Guest => 0,
            Self::User(user) => user.user_id,
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, Self::User(_))
    }

    pub fn is_staff(&self) -> bool {
        match self {
            Self::Guest => false,
            Self::User(user) => user.role.is_staff(),
        }
    }

    /// True when the visitor is the registered owner of `user_id`.
    pub fn owns(&self, user_id: u32) -> bool {
        self.is_registered() && self.user_id() == user_id
    }
}
