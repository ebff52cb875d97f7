//! Enumerations and field types for task management.
//!
//! This module defines the structured data types used to categorise tasks and
//! users: workflow status, priority levels, user roles, and list sort keys.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Workflow status of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[serde(alias = "TODO")]
    Todo,
    #[serde(alias = "IN_PROGRESS")]
    InProgress,
    #[serde(alias = "REVIEW")]
    Review,
    #[serde(alias = "DONE")]
    Done,
    #[serde(alias = "BLOCKED")]
    Blocked,
}

/// Priority classification for task importance.
///
/// Ordering is derived so that completion bonuses can compare against
/// `Priority::High` and above.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    #[serde(alias = "LOW")]
    Low,
    #[serde(alias = "MEDIUM")]
    Medium,
    #[serde(alias = "HIGH")]
    High,
    #[serde(alias = "CRITICAL")]
    Critical,
}

/// Role of a registered user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[serde(alias = "ADMIN")]
    Admin,
    #[serde(alias = "DEVELOPER")]
    Developer,
    #[serde(alias = "VIEWER")]
    Viewer,
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    Order,
    Deadline,
    Priority,
    Id,
}
