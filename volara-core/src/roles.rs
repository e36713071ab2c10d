use serde::{Deserialize, Serialize};

/// Account roles. The ordinals match the legacy integer role column
/// (1 = root, 2 = admin, 3 = customer), so stored values keep their meaning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Root,
    Admin,
    Customer,
}

impl Role {
    pub fn ordinal(&self) -> i16 {
        match self {
            Role::Root => 1,
            Role::Admin => 2,
            Role::Customer => 3,
        }
    }

    pub fn from_ordinal(ordinal: i16) -> Option<Self> {
        match ordinal {
            1 => Some(Role::Root),
            2 => Some(Role::Admin),
            3 => Some(Role::Customer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Root => "ROOT",
            Role::Admin => "ADMIN",
            Role::Customer => "CUSTOMER",
        }
    }

    /// Root inherits admin privileges.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Root | Role::Admin)
    }
}
