//! SQLite-backed directory store.

use crate::{Error, Membership, Result, Role, User, UserId, Zone, ZoneId, ZoneLevel};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Durable store for zones, users, memberships, and role capability grants.
///
/// Holds a single connection; every read goes straight to SQLite. There is
/// deliberately no cache in front of this store, so a revoked membership is
/// invisible to the very next authorization check.
pub struct DirectoryStore {
    conn: Connection,
}

impl DirectoryStore {
    /// Open or create a directory store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory directory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            );
            CREATE TABLE IF NOT EXISTS zones (
                id TEXT PRIMARY KEY,
                parent_id TEXT,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                level TEXT NOT NULL,
                metadata TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS memberships (
                user_id TEXT NOT NULL,
                zone_id TEXT NOT NULL,
                role TEXT NOT NULL,
                is_primary INTEGER NOT NULL DEFAULT 0,
                assigned_at TEXT NOT NULL,
                PRIMARY KEY (user_id, zone_id)
            );
            CREATE INDEX IF NOT EXISTS idx_memberships_user
                ON memberships(user_id, assigned_at);
            CREATE TABLE IF NOT EXISTS role_capabilities (
                role TEXT NOT NULL,
                code TEXT NOT NULL,
                PRIMARY KEY (role, code)
            );
            "#,
        )?;
        Ok(())
    }

    // --- users ---

    pub fn add_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, display_name, active) VALUES (?1, ?2, ?3)",
            params![user.id.to_string(), user.display_name, user.active],
        )?;
        Ok(())
    }

    pub fn set_user_active(&self, user_id: UserId, active: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET active = ?2 WHERE id = ?1",
            params![user_id.to_string(), active],
        )?;
        Ok(())
    }

    /// Whether the user exists and is active. Unknown users read as inactive.
    pub fn user_is_active(&self, user_id: UserId) -> Result<bool> {
        let active: Option<bool> = self
            .conn
            .query_row(
                "SELECT active FROM users WHERE id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(active.unwrap_or(false))
    }

    // --- zones ---

    /// Insert a zone. A non-root zone's parent must already exist, which
    /// makes the stored hierarchy a tree by construction.
    pub fn add_zone(&self, zone: &Zone) -> Result<()> {
        if let Some(parent) = zone.parent_id {
            if self.zone(parent)?.is_none() {
                return Err(Error::UnknownParentZone(parent));
            }
        }
        self.conn.execute(
            "INSERT INTO zones (id, parent_id, code, name, level, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                zone.id.to_string(),
                zone.parent_id.map(|p| p.to_string()),
                zone.code,
                zone.name,
                zone.level.as_str(),
                serde_json::to_string(&zone.metadata)?,
            ],
        )?;
        Ok(())
    }

    pub fn zone(&self, zone_id: ZoneId) -> Result<Option<Zone>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, parent_id, code, name, level, metadata FROM zones WHERE id = ?1",
                [zone_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, parent_id, code, name, level, metadata)) = row else {
            return Ok(None);
        };
        Ok(Some(Zone {
            id: id.parse().map_err(|_| Error::Corrupt(id.clone()))?,
            parent_id: match parent_id {
                Some(p) => Some(p.parse().map_err(|_| Error::Corrupt(p.clone()))?),
                None => None,
            },
            code,
            name,
            level: ZoneLevel::parse(&level).ok_or_else(|| Error::Corrupt(level.clone()))?,
            metadata: serde_json::from_str(&metadata)?,
        }))
    }

    pub fn zone_by_code(&self, code: &str) -> Result<Option<ZoneId>> {
        let id: Option<String> = self
            .conn
            .query_row("SELECT id FROM zones WHERE code = ?1", [code], |row| {
                row.get(0)
            })
            .optional()?;
        match id {
            Some(id) => Ok(Some(id.parse().map_err(|_| Error::Corrupt(id.clone()))?)),
            None => Ok(None),
        }
    }

    pub fn children(&self, zone_id: ZoneId) -> Result<Vec<ZoneId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM zones WHERE parent_id = ?1")?;
        let ids = stmt
            .query_map([zone_id.to_string()], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .filter_map(|id| id.parse().ok())
            .collect();
        Ok(ids)
    }

    /// All zones strictly below `zone_id`, breadth-first.
    pub fn descendants(&self, zone_id: ZoneId) -> Result<Vec<ZoneId>> {
        let mut out = Vec::new();
        let mut frontier = vec![zone_id];
        while let Some(next) = frontier.pop() {
            for child in self.children(next)? {
                out.push(child);
                frontier.push(child);
            }
        }
        Ok(out)
    }

    /// Parent chain from `zone_id` up to the root, nearest first.
    pub fn ancestors(&self, zone_id: ZoneId) -> Result<Vec<ZoneId>> {
        let mut out = Vec::new();
        let mut current = self
            .zone(zone_id)?
            .ok_or(Error::UnknownZone(zone_id))?
            .parent_id;
        while let Some(parent) = current {
            out.push(parent);
            current = self.zone(parent)?.ok_or(Error::UnknownZone(parent))?.parent_id;
        }
        Ok(out)
    }

    // --- memberships ---

    /// Insert a membership. If it is flagged primary, the flag is cleared
    /// from the user's other memberships in the same transaction.
    pub fn add_membership(&self, membership: &Membership) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        if membership.is_primary {
            tx.execute(
                "UPDATE memberships SET is_primary = 0 WHERE user_id = ?1",
                [membership.user_id.to_string()],
            )?;
        }
        tx.execute(
            "INSERT INTO memberships (user_id, zone_id, role, is_primary, assigned_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                membership.user_id.to_string(),
                membership.zone_id.to_string(),
                membership.role.as_str(),
                membership.is_primary,
                membership.assigned_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn remove_membership(&self, user_id: UserId, zone_id: ZoneId) -> Result<()> {
        self.conn.execute(
            "DELETE FROM memberships WHERE user_id = ?1 AND zone_id = ?2",
            params![user_id.to_string(), zone_id.to_string()],
        )?;
        Ok(())
    }

    /// All memberships for a user, oldest assignment first.
    pub fn memberships_of(&self, user_id: UserId) -> Result<Vec<Membership>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, zone_id, role, is_primary, assigned_at FROM memberships
             WHERE user_id = ?1 ORDER BY assigned_at",
        )?;
        let rows = stmt
            .query_map([user_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(user_id, zone_id, role, is_primary, assigned_at)| {
                Some(Membership {
                    user_id: user_id.parse().ok()?,
                    zone_id: zone_id.parse().ok()?,
                    role: Role::parse(&role)?,
                    is_primary,
                    assigned_at: assigned_at.parse().ok()?,
                })
            })
            .collect();
        Ok(rows)
    }

    pub fn role_of(&self, user_id: UserId, zone_id: ZoneId) -> Result<Option<Role>> {
        let role: Option<String> = self
            .conn
            .query_row(
                "SELECT role FROM memberships WHERE user_id = ?1 AND zone_id = ?2",
                params![user_id.to_string(), zone_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match role {
            Some(r) => Ok(Some(
                Role::parse(&r).ok_or_else(|| Error::Corrupt(r.clone()))?,
            )),
            None => Ok(None),
        }
    }

    // --- capability grants ---

    pub fn grant_capability(&self, role: Role, code: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO role_capabilities (role, code) VALUES (?1, ?2)",
            params![role.as_str(), code],
        )?;
        Ok(())
    }

    pub fn revoke_capability(&self, role: Role, code: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM role_capabilities WHERE role = ?1 AND code = ?2",
            params![role.as_str(), code],
        )?;
        Ok(())
    }

    pub fn capabilities_for_role(&self, role: Role) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT code FROM role_capabilities WHERE role = ?1")?;
        let codes = stmt
            .query_map([role.as_str()], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(codes)
    }

    /// Every capability code granted to any role. Feeds the registry that
    /// validates synthesized `entity.action` strings at startup.
    pub fn granted_codes(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT code FROM role_capabilities")?;
        let codes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(codes)
    }
}
