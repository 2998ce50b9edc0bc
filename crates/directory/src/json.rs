//! In-memory directory loaded from a JSON fixture.
//!
//! ```json
//! {
//!   "roles": [{"id": 2, "name": "Employee"}],
//!   "sections": [{"id": 1, "parent_id": null, "name": "Leave", "order": 0,
//!                 "visible_to_roles": [2], "link": "/leave/"}],
//!   "employees": [{"user_id": "jdoe", "emp_code": "E001", "first_name": "Jane", "is_active": true}]
//! }
//! ```

use crate::choose_link;
use async_trait::async_trait;
use rolerag_core::directory::normalize_section_name;
use rolerag_core::error::DirectoryError;
use rolerag_core::{Directory, EmployeeStatus, RoleId, RoleSet, SectionLink, SectionNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRow {
    pub id: RoleId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRow {
    /// Login identifier; lookups match this or `emp_code`.
    #[serde(default)]
    pub user_id: Option<String>,
    pub emp_code: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// The on-disk fixture format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryFixture {
    #[serde(default)]
    pub roles: Vec<RoleRow>,
    #[serde(default)]
    pub sections: Vec<SectionNode>,
    #[serde(default)]
    pub employees: Vec<EmployeeRow>,
}

/// A read-only directory held in memory.
pub struct JsonDirectory {
    fixture: DirectoryFixture,
    by_name: HashMap<String, Vec<usize>>,
}

impl JsonDirectory {
    pub fn new(fixture: DirectoryFixture) -> Self {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, node) in fixture.sections.iter().enumerate() {
            by_name.entry(normalize_section_name(&node.name)).or_default().push(pos);
        }
        Self { fixture, by_name }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DirectoryError::Storage(format!("Failed to read {}: {e}", path.display())))?;
        let fixture: DirectoryFixture = serde_json::from_str(&raw)
            .map_err(|e| DirectoryError::InvalidData(format!("{}: {e}", path.display())))?;

        info!(
            sections = fixture.sections.len(),
            roles = fixture.roles.len(),
            employees = fixture.employees.len(),
            "JSON directory loaded from {}",
            path.display()
        );
        Ok(Self::new(fixture))
    }

    /// Children of `id` in sibling order.
    fn children(&self, id: i64) -> Vec<&SectionNode> {
        let mut kids: Vec<&SectionNode> = self
            .fixture
            .sections
            .iter()
            .filter(|n| n.parent_id == Some(id))
            .collect();
        kids.sort_by_key(|n| n.order);
        kids
    }
}

#[async_trait]
impl Directory for JsonDirectory {
    fn name(&self) -> &str {
        "json"
    }

    async fn sections(&self) -> Result<Vec<SectionNode>, DirectoryError> {
        Ok(self.fixture.sections.clone())
    }

    async fn role_names(&self) -> Result<HashMap<RoleId, String>, DirectoryError> {
        Ok(self
            .fixture
            .roles
            .iter()
            .map(|r| (r.id, r.name.clone()))
            .collect())
    }

    async fn resolve_section_link(&self, name: &str, roles: &RoleSet) -> Result<SectionLink, DirectoryError> {
        let key = normalize_section_name(name);
        let Some(candidates) = self.by_name.get(&key) else {
            return Ok(SectionLink::unavailable(format!("The section \"{name}\" does not exist")));
        };

        // Prefer a same-named section the caller can actually see.
        let section = candidates
            .iter()
            .map(|&pos| &self.fixture.sections[pos])
            .find(|n| n.is_visible_to(roles))
            .unwrap_or(&self.fixture.sections[candidates[0]]);

        Ok(choose_link(section, self.children(section.id), roles))
    }

    async fn validate_employee(&self, code: &str) -> Result<EmployeeStatus, DirectoryError> {
        let code = code.trim();
        let found = self
            .fixture
            .employees
            .iter()
            .find(|e| e.user_id.as_deref() == Some(code) || e.emp_code == code);

        Ok(match found {
            Some(e) => EmployeeStatus {
                valid: e.is_active,
                is_active: Some(e.is_active),
                first_name: e.first_name.clone(),
                emp_code: Some(e.emp_code.clone()),
            },
            None => EmployeeStatus::unknown(),
        })
    }
}
