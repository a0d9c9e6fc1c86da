//! SQLite audit store implementation.

use crate::{AuditEntry, EntryId, Result, ACTION_DENIED};
use chrono::{DateTime, Utc};
use directory::{UserId, ZoneId};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::warn;

/// Append-only audit store.
///
/// Writes swallow their own failures (logged, never propagated); reads
/// degrade to empty result sets. Concurrent appenders are safe — each
/// entry is a single SQLite insert and the schema has no cross-row state.
pub struct AuditStore {
    conn: Connection,
}

impl AuditStore {
    /// Open or create an audit store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory audit store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_entries (
                id TEXT PRIMARY KEY,
                zone_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                action TEXT NOT NULL,
                old_value TEXT,
                new_value TEXT,
                ip_address TEXT,
                user_agent TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_entity
                ON audit_entries(entity_type, entity_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_audit_user
                ON audit_entries(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_audit_zone
                ON audit_entries(zone_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_audit_action
                ON audit_entries(action, created_at);
            "#,
        )?;
        Ok(())
    }

    /// Append one entry. Returns the assigned id, or `None` if the write
    /// failed — the failure is logged operationally and must not abort
    /// the caller's business operation.
    pub fn log(&self, entry: &AuditEntry) -> Option<EntryId> {
        match self.append(entry) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(
                    entity_type = entry.entity_type,
                    entity_id = entry.entity_id,
                    action = entry.action,
                    error = %e,
                    "audit write failed, entry dropped"
                );
                None
            }
        }
    }

    /// Record a rejected attempt. Convenience wrapper over [`log`] with
    /// `action = "denied"` and the reason in `new_value`.
    ///
    /// [`log`]: AuditStore::log
    pub fn log_denial(
        &self,
        zone_id: ZoneId,
        user_id: UserId,
        reason: &str,
        entity_type: &str,
        entity_id: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) {
        let entry = AuditEntry::denial(zone_id, user_id, reason, entity_type, entity_id)
            .with_request_info(ip_address, user_agent);
        self.log(&entry);
    }

    /// Fallible append. Exposed for the background writer; most callers
    /// want [`log`](AuditStore::log).
    pub fn append(&self, entry: &AuditEntry) -> Result<EntryId> {
        self.conn.execute(
            "INSERT INTO audit_entries
             (id, zone_id, user_id, entity_type, entity_id, action,
              old_value, new_value, ip_address, user_agent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.id.to_string(),
                entry.zone_id.to_string(),
                entry.user_id.to_string(),
                entry.entity_type,
                entry.entity_id,
                entry.action,
                entry
                    .old_value
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                entry
                    .new_value
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                entry.ip_address,
                entry.user_agent,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(entry.id)
    }

    /// History for one entity, newest first.
    pub fn entity_logs(&self, entity_type: &str, entity_id: &str, limit: usize) -> Vec<AuditEntry> {
        self.query(
            "WHERE entity_type = ?1 AND entity_id = ?2",
            params![entity_type, entity_id, limit as i64],
        )
    }

    /// Everything one user did (and was refused), newest first.
    pub fn user_actions(&self, user_id: UserId, limit: usize) -> Vec<AuditEntry> {
        self.query(
            "WHERE user_id = ?1",
            params![user_id.to_string(), limit as i64],
        )
    }

    /// Everything that happened in one zone, newest first.
    pub fn zone_logs(&self, zone_id: ZoneId, limit: usize) -> Vec<AuditEntry> {
        self.query(
            "WHERE zone_id = ?1",
            params![zone_id.to_string(), limit as i64],
        )
    }

    /// Denial records in a date window, newest first.
    pub fn access_denials(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Vec<AuditEntry> {
        self.query(
            "WHERE action = ?1 AND created_at >= ?2 AND created_at <= ?3",
            params![ACTION_DENIED, from.to_rfc3339(), to.to_rfc3339(), limit as i64],
        )
    }

    fn query(&self, filter: &str, params: impl rusqlite::Params) -> Vec<AuditEntry> {
        let sql = format!(
            "SELECT id, zone_id, user_id, entity_type, entity_id, action,
                    old_value, new_value, ip_address, user_agent, created_at
             FROM audit_entries {filter}
             ORDER BY created_at DESC, id LIMIT ?{}",
            // The limit is always the last bound parameter.
            filter.matches('?').count() + 1
        );
        match self.try_query(&sql, params) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "audit query failed, returning empty result");
                Vec::new()
            }
        }
    }

    /// Drop the backing table to simulate a storage outage.
    #[cfg(test)]
    fn break_storage(&self) {
        self.conn
            .execute_batch("DROP TABLE audit_entries")
            .unwrap();
    }

    fn try_query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    row.get::<_, Option<String>>(9)?,
                    row.get::<_, String>(10)?,
                ))
            })?
            .filter_map(|r| r.ok())
            .filter_map(row_to_entry)
            .collect();
        Ok(entries)
    }
}

type Row = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

fn row_to_entry(row: Row) -> Option<AuditEntry> {
    let (id, zone_id, user_id, entity_type, entity_id, action, old, new, ip, ua, created_at) = row;
    Some(AuditEntry {
        id: EntryId(id.parse().ok()?),
        zone_id: zone_id.parse().ok()?,
        user_id: user_id.parse().ok()?,
        entity_type,
        entity_id,
        action,
        old_value: old.and_then(|v| serde_json::from_str(&v).ok()),
        new_value: new.and_then(|v| serde_json::from_str(&v).ok()),
        ip_address: ip,
        user_agent: ua,
        created_at: created_at.parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_log_and_entity_history() {
        let store = AuditStore::in_memory().unwrap();
        let zone = ZoneId::new();
        let user = UserId::new();

        let mut created = AuditEntry::new(zone, user, "lead", "lead-1", "create");
        created.created_at = Utc::now() - Duration::seconds(10);
        let updated = AuditEntry::new(zone, user, "lead", "lead-1", "update").with_change(
            serde_json::json!({"status": "new"}),
            serde_json::json!({"status": "won"}),
        );

        assert_eq!(store.log(&created), Some(created.id));
        assert_eq!(store.log(&updated), Some(updated.id));
        store.log(&AuditEntry::new(zone, user, "lead", "lead-2", "create"));

        let history = store.entity_logs("lead", "lead-1", 10);
        assert_eq!(history.len(), 2);
        // Newest first.
        assert_eq!(history[0].action, "update");
        assert_eq!(
            history[0].old_value,
            Some(serde_json::json!({"status": "new"}))
        );
        assert_eq!(history[1].action, "create");

        assert_eq!(store.entity_logs("lead", "lead-1", 1).len(), 1);
    }

    #[test]
    fn test_duplicate_id_is_swallowed() {
        let store = AuditStore::in_memory().unwrap();
        let entry = AuditEntry::new(ZoneId::new(), UserId::new(), "lead", "l", "create");
        assert!(store.log(&entry).is_some());
        // Second insert violates the primary key; log reports None and
        // the original row is untouched.
        assert!(store.log(&entry).is_none());
        assert_eq!(store.entity_logs("lead", "l", 10).len(), 1);
    }

    #[test]
    fn test_read_failure_degrades_to_empty() {
        let store = AuditStore::in_memory().unwrap();
        let zone = ZoneId::new();
        let user = UserId::new();
        store.log(&AuditEntry::new(zone, user, "lead", "l1", "create"));
        assert_eq!(store.zone_logs(zone, 10).len(), 1);

        store.break_storage();

        // Reads come back empty rather than propagating the failure.
        assert!(store.entity_logs("lead", "l1", 10).is_empty());
        assert!(store.user_actions(user, 10).is_empty());
        assert!(store.zone_logs(zone, 10).is_empty());
        let now = Utc::now();
        assert!(store
            .access_denials(now - Duration::days(1), now, 10)
            .is_empty());

        // Writes are swallowed the same way.
        assert!(store
            .log(&AuditEntry::new(zone, user, "lead", "l2", "create"))
            .is_none());
    }

    #[test]
    fn test_user_and_zone_views() {
        let store = AuditStore::in_memory().unwrap();
        let (zone_a, zone_b) = (ZoneId::new(), ZoneId::new());
        let (alice, bob) = (UserId::new(), UserId::new());

        store.log(&AuditEntry::new(zone_a, alice, "lead", "l1", "create"));
        store.log(&AuditEntry::new(zone_a, bob, "lead", "l2", "create"));
        store.log(&AuditEntry::new(zone_b, alice, "project", "p1", "update"));

        assert_eq!(store.user_actions(alice, 10).len(), 2);
        assert_eq!(store.user_actions(bob, 10).len(), 1);
        assert_eq!(store.zone_logs(zone_a, 10).len(), 2);
        assert_eq!(store.zone_logs(zone_b, 10).len(), 1);
    }

    #[test]
    fn test_access_denials_window() {
        let store = AuditStore::in_memory().unwrap();
        let zone = ZoneId::new();
        let user = UserId::new();

        store.log_denial(
            zone,
            user,
            "Cross-zone access denied",
            "lead",
            "l1",
            Some("10.0.0.9".into()),
            Some("curl/8".into()),
        );
        store.log(&AuditEntry::new(zone, user, "lead", "l1", "update"));

        let mut stale = AuditEntry::denial(zone, user, "Missing capability: lead.assign", "lead", "l2");
        stale.created_at = Utc::now() - Duration::days(30);
        store.log(&stale);

        let now = Utc::now();
        let recent = store.access_denials(now - Duration::days(7), now, 50);
        assert_eq!(recent.len(), 1);
        assert!(recent[0].is_denial());
        assert_eq!(recent[0].ip_address.as_deref(), Some("10.0.0.9"));
        assert_eq!(
            recent[0].new_value,
            Some(serde_json::json!({"reason": "Cross-zone access denied"}))
        );

        let all = store.access_denials(now - Duration::days(60), now, 50);
        assert_eq!(all.len(), 2);
    }
}
