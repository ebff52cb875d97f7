//! User and project records.
//!
//! Users carry the gamification state: an XP accumulator and the set of
//! unlocked achievement ids. Both are mutated only by the achievement
//! evaluator, never directly by command handlers.

use serde::{Deserialize, Serialize};

use crate::fields::Role;

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: Role,
    /// Experience points. Non-decreasing under normal operation.
    #[serde(default)]
    pub xp: u64,
    /// Unlocked achievement ids. Grows, never shrinks.
    #[serde(default)]
    pub achievements: Vec<String>,
}

impl User {
    pub fn new(username: &str, role: Role) -> Self {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            role,
            xp: 0,
            achievements: Vec::new(),
        }
    }
}

/// A project grouping tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
}

impl Project {
    pub fn new(name: &str, created_at: i64) -> Self {
        Project {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at,
        }
    }
}
