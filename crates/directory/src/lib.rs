//! Directory backends for rolerag.
//!
//! Two implementations of `rolerag_core::Directory`:
//! - [`JsonDirectory`]: an in-memory fixture loaded from a JSON file
//! - `SqliteDirectory`: menus, role mappings and employees in SQLite
//!   (behind the default `sqlite` feature)

pub mod json;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use json::{DirectoryFixture, EmployeeRow, JsonDirectory, RoleRow};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDirectory;

use rolerag_config::DirectoryConfig;
use rolerag_core::error::DirectoryError;
use rolerag_core::{Directory, RoleSet, SectionLink, SectionNode};
use std::sync::Arc;

/// Open the configured directory backend.
pub async fn open(config: &DirectoryConfig) -> Result<Arc<dyn Directory>, DirectoryError> {
    match config.backend.as_str() {
        "json" => Ok(Arc::new(JsonDirectory::from_path(&config.path).await?)),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteDirectory::new(&config.path).await?)),
        other => Err(DirectoryError::Storage(format!(
            "Unsupported directory backend: {other}"
        ))),
    }
}

/// Pick the link for a section the caller can see.
///
/// `children` must already be in sibling order. The section's own link wins;
/// otherwise the first visible child with a navigable link is used.
pub(crate) fn choose_link<'a>(
    section: &'a SectionNode,
    children: impl IntoIterator<Item = &'a SectionNode>,
    roles: &RoleSet,
) -> SectionLink {
    if !section.is_visible_to(roles) {
        return SectionLink::unavailable(format!("\"{}\" is not accessible for these roles", section.name));
    }
    if let Some(link) = section.navigable_link() {
        return SectionLink::Available { url: link.to_string() };
    }
    children
        .into_iter()
        .filter(|child| child.is_visible_to(roles))
        .find_map(|child| child.navigable_link())
        .map(|link| SectionLink::Available { url: link.to_string() })
        .unwrap_or_else(|| {
            SectionLink::unavailable(format!(
                "\"{}\" and its subsections have no accessible links",
                section.name
            ))
        })
}
