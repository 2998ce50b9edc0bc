//! SQLite directory backend.
//!
//! Four tables mirror the platform's menu store:
//! - `roles` with display names
//! - `menus`, the section forest (`link` of `#` marks a container)
//! - `menu_roles`, the role grants per menu; a menu without rows is unrestricted
//! - `employees`, looked up by user id or employee code

use crate::choose_link;
use crate::json::DirectoryFixture;
use async_trait::async_trait;
use rolerag_core::directory::normalize_section_name;
use rolerag_core::error::DirectoryError;
use rolerag_core::{Directory, EmployeeStatus, RoleId, RoleSet, SectionLink, SectionNode};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};

pub struct SqliteDirectory {
    pool: SqlitePool,
}

fn query_err(what: &'static str) -> impl FnOnce(sqlx::Error) -> DirectoryError {
    move |e| DirectoryError::QueryFailed(format!("{what}: {e}"))
}

fn role_id(raw: i64) -> Result<RoleId, DirectoryError> {
    RoleId::try_from(raw).map_err(|_| DirectoryError::InvalidData(format!("role id {raw} out of range")))
}

fn node_from_row(row: &SqliteRow) -> SectionNode {
    SectionNode {
        id: row.get("id"),
        parent_id: row.get("parent_id"),
        name: row.get("name"),
        order: row.get("order_no"),
        visible_to_roles: Default::default(),
        link: row.get("link"),
    }
}

impl SqliteDirectory {
    /// Open (or create) the directory database at `path`.
    pub async fn new(path: &str) -> Result<Self, DirectoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| DirectoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| DirectoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let directory = Self { pool };
        directory.run_migrations().await?;
        info!("SQLite directory initialized at {path}");
        Ok(directory)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, DirectoryError> {
        let directory = Self { pool };
        directory.run_migrations().await?;
        Ok(directory)
    }

    async fn run_migrations(&self) -> Result<(), DirectoryError> {
        let statements = [
            (
                "roles table",
                r#"
                CREATE TABLE IF NOT EXISTS roles (
                    id    INTEGER PRIMARY KEY,
                    name  TEXT NOT NULL
                )
                "#,
            ),
            (
                "menus table",
                r#"
                CREATE TABLE IF NOT EXISTS menus (
                    id         INTEGER PRIMARY KEY,
                    parent_id  INTEGER,
                    name       TEXT NOT NULL,
                    name_key   TEXT NOT NULL,
                    order_no   INTEGER NOT NULL DEFAULT 0,
                    link       TEXT
                )
                "#,
            ),
            (
                "menu_roles table",
                r#"
                CREATE TABLE IF NOT EXISTS menu_roles (
                    menu_id  INTEGER NOT NULL REFERENCES menus(id) ON DELETE CASCADE,
                    role_id  INTEGER NOT NULL,
                    PRIMARY KEY (menu_id, role_id)
                )
                "#,
            ),
            (
                "employees table",
                r#"
                CREATE TABLE IF NOT EXISTS employees (
                    emp_code    TEXT PRIMARY KEY,
                    user_id     TEXT UNIQUE,
                    first_name  TEXT,
                    is_active   INTEGER NOT NULL DEFAULT 1
                )
                "#,
            ),
            (
                "menus parent index",
                "CREATE INDEX IF NOT EXISTS idx_menus_parent ON menus(parent_id)",
            ),
            (
                "menus name index",
                "CREATE INDEX IF NOT EXISTS idx_menus_name_key ON menus(name_key)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| DirectoryError::Storage(format!("migration {what}: {e}")))?;
        }
        debug!("Directory migrations complete");
        Ok(())
    }

    /// Replace the directory contents with a fixture.
    pub async fn import(&self, fixture: &DirectoryFixture) -> Result<(), DirectoryError> {
        let mut tx = self.pool.begin().await.map_err(query_err("begin import"))?;

        for table in ["menu_roles", "menus", "roles", "employees"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(query_err("clear tables"))?;
        }

        for role in &fixture.roles {
            sqlx::query("INSERT INTO roles (id, name) VALUES (?, ?)")
                .bind(i64::from(role.id))
                .bind(&role.name)
                .execute(&mut *tx)
                .await
                .map_err(query_err("insert role"))?;
        }

        // Menus first so the role grants can reference them.
        for node in &fixture.sections {
            sqlx::query("INSERT INTO menus (id, parent_id, name, name_key, order_no, link) VALUES (?, ?, ?, ?, ?, ?)")
                .bind(node.id)
                .bind(node.parent_id)
                .bind(&node.name)
                .bind(normalize_section_name(&node.name))
                .bind(node.order)
                .bind(&node.link)
                .execute(&mut *tx)
                .await
                .map_err(query_err("insert menu"))?;
        }
        for node in &fixture.sections {
            for role in &node.visible_to_roles {
                sqlx::query("INSERT INTO menu_roles (menu_id, role_id) VALUES (?, ?)")
                    .bind(node.id)
                    .bind(i64::from(*role))
                    .execute(&mut *tx)
                    .await
                    .map_err(query_err("insert menu role"))?;
            }
        }

        for employee in &fixture.employees {
            sqlx::query("INSERT INTO employees (emp_code, user_id, first_name, is_active) VALUES (?, ?, ?, ?)")
                .bind(&employee.emp_code)
                .bind(&employee.user_id)
                .bind(&employee.first_name)
                .bind(employee.is_active)
                .execute(&mut *tx)
                .await
                .map_err(query_err("insert employee"))?;
        }

        tx.commit().await.map_err(query_err("commit import"))?;
        info!(
            sections = fixture.sections.len(),
            roles = fixture.roles.len(),
            employees = fixture.employees.len(),
            "Directory fixture imported"
        );
        Ok(())
    }

    async fn grants_for(&self, node: &mut SectionNode) -> Result<(), DirectoryError> {
        let rows = sqlx::query("SELECT role_id FROM menu_roles WHERE menu_id = ?")
            .bind(node.id)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err("menu roles"))?;
        for row in rows {
            node.visible_to_roles.insert(role_id(row.get("role_id"))?);
        }
        Ok(())
    }

    async fn children(&self, parent: i64) -> Result<Vec<SectionNode>, DirectoryError> {
        let rows = sqlx::query(
            "SELECT id, parent_id, name, order_no, link FROM menus WHERE parent_id = ? ORDER BY order_no, id",
        )
        .bind(parent)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("menu children"))?;

        let mut kids = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut node = node_from_row(row);
            self.grants_for(&mut node).await?;
            kids.push(node);
        }
        Ok(kids)
    }
}

#[async_trait]
impl Directory for SqliteDirectory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn sections(&self) -> Result<Vec<SectionNode>, DirectoryError> {
        let rows = sqlx::query("SELECT id, parent_id, name, order_no, link FROM menus ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err("menus"))?;
        let mut nodes: Vec<SectionNode> = rows.iter().map(node_from_row).collect();

        let positions: HashMap<i64, usize> = nodes.iter().enumerate().map(|(pos, n)| (n.id, pos)).collect();
        let grants = sqlx::query("SELECT menu_id, role_id FROM menu_roles")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err("menu roles"))?;
        for row in grants {
            let menu_id: i64 = row.get("menu_id");
            if let Some(&pos) = positions.get(&menu_id) {
                nodes[pos].visible_to_roles.insert(role_id(row.get("role_id"))?);
            }
        }
        Ok(nodes)
    }

    async fn role_names(&self) -> Result<HashMap<RoleId, String>, DirectoryError> {
        let rows = sqlx::query("SELECT id, name FROM roles")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err("roles"))?;
        rows.iter()
            .map(|row| -> Result<(RoleId, String), DirectoryError> { Ok((role_id(row.get("id"))?, row.get("name"))) })
            .collect()
    }

    async fn resolve_section_link(&self, name: &str, roles: &RoleSet) -> Result<SectionLink, DirectoryError> {
        let key = normalize_section_name(name);
        let rows = sqlx::query(
            "SELECT id, parent_id, name, order_no, link FROM menus WHERE name_key = ? ORDER BY id",
        )
        .bind(&key)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("menu by name"))?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut node = node_from_row(row);
            self.grants_for(&mut node).await?;
            candidates.push(node);
        }

        // Prefer a same-named menu the caller can actually see.
        let pos = match candidates.iter().position(|n| n.is_visible_to(roles)) {
            Some(pos) => pos,
            None if !candidates.is_empty() => 0,
            None => return Ok(SectionLink::unavailable(format!("The section \"{name}\" does not exist"))),
        };
        let section = &candidates[pos];

        let children = self.children(section.id).await?;
        Ok(choose_link(section, &children, roles))
    }

    async fn validate_employee(&self, code: &str) -> Result<EmployeeStatus, DirectoryError> {
        let code = code.trim();
        let row = sqlx::query(
            "SELECT emp_code, first_name, is_active FROM employees WHERE user_id = ?1 OR emp_code = ?1 LIMIT 1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err("employee"))?;

        Ok(match row {
            Some(row) => {
                let is_active = row.get::<i64, _>("is_active") == 1;
                EmployeeStatus {
                    valid: is_active,
                    is_active: Some(is_active),
                    first_name: row.get("first_name"),
                    emp_code: Some(row.get("emp_code")),
                }
            }
            None => EmployeeStatus::unknown(),
        })
    }
}
