use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::category::CategoryId;
use crate::domain::complaint::{Complaint, Priority};
use crate::domain::user::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub i64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationRole {
    Admin,
    SuperAdmin,
}

impl EscalationRole {
    pub fn as_role(&self) -> Role {
        match self {
            Self::Admin => Role::Admin,
            Self::SuperAdmin => Role::SuperAdmin,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.as_role().as_str()
    }

    pub fn parse(value: &str) -> Option<Self> {
        match Role::parse(value)? {
            Role::Admin => Some(Self::Admin),
            Role::SuperAdmin => Some(Self::SuperAdmin),
            Role::User => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub id: RuleId,
    /// `None` matches any category.
    pub category_id: Option<CategoryId>,
    /// `None` matches any priority.
    pub priority: Option<Priority>,
    pub hours_before_escalation: u32,
    pub escalate_to_role: EscalationRole,
    pub active: bool,
}

impl EscalationRule {
    pub fn matches(&self, complaint: &Complaint) -> bool {
        self.active
            && self.category_id.map_or(true, |category| category == complaint.category_id)
            && self.priority.map_or(true, |priority| priority == complaint.priority)
    }

    /// Number of filters set: 2 for fully specific rules, 0 for catch-alls.
    pub fn specificity(&self) -> u8 {
        u8::from(self.category_id.is_some()) + u8::from(self.priority.is_some())
    }
}
