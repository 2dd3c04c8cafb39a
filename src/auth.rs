use serde::{Deserialize, Serialize};

/// Session key naming the authenticated principal.
pub const USERNAME_KEY: &str = "username";

/// Fixed, ordered user classification. The ordering is meaningful:
/// authorization checks compare against a minimum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    User = 0,
    Staff = 1,
    Admin = 2,
}

impl UserType {
    /// Maps the integer stored in the users table back to a type.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(UserType::User),
            1 => Some(UserType::Staff),
            2 => Some(UserType::Admin),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        self as i64
    }
}

/// struct containing user info
/// this may be sent directly to the client, do not store sensitive
/// information in here (password hashes stay in the users table)
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub username: String,
    pub user_type: UserType,
}
