//! SQLite-backed audit trail for the authorization core.
//!
//! Every completed mutation and every denied attempt ends up here as an
//! immutable [`AuditEntry`] — the compliance record for "who did what,
//! where, and what was refused". A denial is an ordinary entry whose
//! action is the reserved [`ACTION_DENIED`] sentinel, with the denial
//! reason captured in `new_value`.
//!
//! # Overview
//!
//! The sink has two halves:
//!
//! 1. **Write path** — [`AuditStore::log`] appends one entry and swallows
//!    failures (after logging them operationally): an audit outage must
//!    never abort the business operation that triggered it, nor can it be
//!    exploited to permit anything — the authorization decision was
//!    already made, fail-closed, before the write.
//!
//! 2. **Read path** — compliance queries ([`AuditStore::entity_logs`],
//!    [`AuditStore::user_actions`], [`AuditStore::zone_logs`],
//!    [`AuditStore::access_denials`]), all newest-first with a
//!    caller-supplied limit. Read errors come back as empty result sets
//!    so an audit outage cannot block unrelated traffic.
//!
//! There is deliberately no update or delete anywhere in this crate.
//!
//! # Background writer
//!
//! Denial logging is fire-and-forget at the call site: entity services
//! enqueue on an [`AuditHandle`] before returning their 403 and never
//! wait for the row to land. The [`AuditWriter`] task owns the store and
//! drains the channel with its own failure isolation, so a record is
//! written even if the originating request has already been dropped.
//!
//! # Example
//!
//! ```no_run
//! use audit::{AuditEntry, AuditStore};
//! use directory::{UserId, ZoneId};
//!
//! let store = AuditStore::open("audit.db")?;
//! let (zone, user) = (ZoneId::new(), UserId::new());
//!
//! // A completed mutation.
//! store.log(
//!     &AuditEntry::new(zone, user, "lead", "lead-42", "update")
//!         .with_change(serde_json::json!({"status": "new"}), serde_json::json!({"status": "won"})),
//! );
//!
//! // A rejected attempt.
//! store.log_denial(zone, user, "Cross-zone access denied", "lead", "lead-42", None, None);
//!
//! for entry in store.entity_logs("lead", "lead-42", 50) {
//!     println!("{} {} by {}", entry.created_at, entry.action, entry.user_id);
//! }
//! # Ok::<(), audit::Error>(())
//! ```

mod entry;
mod error;
mod store;
mod writer;

pub use entry::{AuditEntry, EntryId, ACTION_DENIED};
pub use error::{Error, Result};
pub use store::AuditStore;
pub use writer::{AuditHandle, AuditWriter};
