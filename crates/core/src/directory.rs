//! Directory trait: the role/menu store, section links, and employees.
//!
//! The directory owns the navigable menu of the HR platform. The core only
//! reads from it: the section forest and role names are fetched when a
//! knowledge snapshot is built, and link lookups happen once per related
//! section in an answer.

use crate::error::DirectoryError;
use crate::role::{RoleId, RoleSet};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A navigable node in the platform's menu hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionNode {
    pub id: i64,

    /// Parent node; `None` for top-level sections.
    #[serde(default)]
    pub parent_id: Option<i64>,

    pub name: String,

    /// Sibling order, ascending. Missing values sort as 0.
    #[serde(default)]
    pub order: i64,

    /// Roles allowed to see this node. Empty means unrestricted.
    #[serde(default)]
    pub visible_to_roles: BTreeSet<RoleId>,

    /// Relative link into the platform (`#` or absent for pure containers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl SectionNode {
    /// True iff the node is unrestricted or shares a role with `roles`.
    pub fn is_visible_to(&self, roles: &RoleSet) -> bool {
        self.visible_to_roles.is_empty() || roles.contains_any(&self.visible_to_roles)
    }

    /// The node's link, if it points somewhere.
    pub fn navigable_link(&self) -> Option<&str> {
        self.link
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty() && *l != "#")
    }
}

/// Outcome of a section link lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionLink {
    /// A navigable link (possibly relative to the platform base URL).
    Available { url: String },
    /// No link for these roles; the reason is diagnostic only.
    Unavailable { reason: String },
}

impl SectionLink {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Result of checking an employee code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeStatus {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emp_code: Option<String>,
}

impl EmployeeStatus {
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Normalize a section name into its lookup key.
///
/// Leading list markers are stripped, whitespace runs collapse to one
/// space, and the result is lower-cased.
pub fn normalize_section_name(name: &str) -> String {
    name.trim_start_matches(|c: char| c == '-' || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The core Directory trait.
///
/// Implementations: JSON fixture (in-memory), SQLite.
#[async_trait]
pub trait Directory: Send + Sync {
    /// The backend name (e.g., "json", "sqlite").
    fn name(&self) -> &str;

    /// The full section forest, in relation order.
    async fn sections(&self) -> std::result::Result<Vec<SectionNode>, DirectoryError>;

    /// Display names for role identifiers.
    async fn role_names(&self) -> std::result::Result<HashMap<RoleId, String>, DirectoryError>;

    /// Resolve a section name to a link the caller may open.
    async fn resolve_section_link(
        &self,
        name: &str,
        roles: &RoleSet,
    ) -> std::result::Result<SectionLink, DirectoryError>;

    /// Look up an employee by code.
    async fn validate_employee(&self, code: &str) -> std::result::Result<EmployeeStatus, DirectoryError>;
}
