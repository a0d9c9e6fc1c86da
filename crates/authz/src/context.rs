//! Per-request permission snapshot.

use directory::{Role, UserId, ZoneId};
use std::collections::HashSet;

/// Read-only snapshot of a user's authorization state, built once per
/// authenticated request by
/// [`Engine::permission_context`](crate::Engine::permission_context) and
/// threaded explicitly through entity-service calls. Never persisted;
/// dropped at request end.
///
/// The snapshot exists for cheap repeated reads within one request (DTO
/// shaping, list filtering). Decisions that must observe revocation
/// immediately go back through the engine, which re-reads the store.
#[derive(Debug, Clone)]
pub struct PermissionContext {
    pub user_id: UserId,
    /// Role held in the primary zone, if any.
    pub role: Option<Role>,
    pub accessible_zones: HashSet<ZoneId>,
    pub capabilities: HashSet<String>,
    pub primary_zone_id: Option<ZoneId>,
}

impl PermissionContext {
    pub fn can_access(&self, zone_id: ZoneId) -> bool {
        self.accessible_zones.contains(&zone_id)
    }

    pub fn has_capability(&self, code: &str) -> bool {
        self.capabilities.contains(code)
    }
}
