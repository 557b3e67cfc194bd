use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            "super_admin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
}

/// The caller of a workflow operation, as resolved by the identity service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    pub active: bool,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self { user_id: UserId(user_id.into()), role, active: true }
    }

    pub fn is_staff(&self) -> bool {
        self.active && self.role.is_staff()
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self { user_id: user.id.clone(), role: user.role, active: user.active }
    }
}

#[cfg(test)]
mod tests {
    use super::{Actor, Role};

    #[test]
    fn role_round_trips_from_storage_encoding() {
        for role in [Role::User, Role::Admin, Role::SuperAdmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("moderator"), None);
    }

    #[test]
    fn inactive_staff_is_not_treated_as_staff() {
        let mut actor = Actor::new("admin-1", Role::Admin);
        assert!(actor.is_staff());

        actor.active = false;
        assert!(!actor.is_staff());
    }
}
