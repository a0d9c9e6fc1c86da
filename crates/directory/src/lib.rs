//! Zone directory: the tenant hierarchy and who belongs where.
//!
//! A **zone** is a node in the tenant tree (root → region → branch → team).
//! A **membership** binds a user to a zone with a role; it is the unit of
//! data access for the whole system. This crate owns the durable state the
//! authorization core reads: zones, users, memberships, and the role →
//! capability grant table.
//!
//! The read side that authorization depends on is the [`ZoneDirectory`]
//! trait. Its methods never return errors — a failed lookup logs a warning
//! and reads as "no access", so storage trouble can only ever deny.
//!
//! Membership is per-zone with no inheritance: being assigned to a region
//! does not grant access to its branches. [`HierarchyDirectory`] is the
//! opt-in alternative that unions each membership with its descendant
//! zones, for deployments that decide parent-zone staff should see child
//! data.

mod directory;
mod error;
mod store;
mod types;

pub use directory::{HierarchyDirectory, ZoneDirectory};
pub use error::{Error, Result};
pub use store::DirectoryStore;
pub use types::{Membership, Role, User, UserId, Zone, ZoneId, ZoneLevel};
