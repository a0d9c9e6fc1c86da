//! Read seam consumed by the authorization core.

use crate::{DirectoryStore, Result, Role, UserId, ZoneId};
use std::collections::HashSet;
use tracing::warn;

/// Membership lookups as the authorization engine sees them.
///
/// Implementations never surface storage errors: a failed lookup reads as
/// "no access" so that an outage can only ever deny. Which zones a
/// membership reaches is an implementation decision — [`DirectoryStore`]
/// grants exactly the zones with an explicit membership row, while
/// [`HierarchyDirectory`] also grants their descendants. Callers are
/// written against this trait so that policy can change without touching
/// them.
pub trait ZoneDirectory {
    /// Every zone the user may reach. Empty on lookup failure.
    fn accessible_zones(&self, user_id: UserId) -> HashSet<ZoneId>;

    /// Whether the user may reach the given zone.
    fn is_member(&self, user_id: UserId, zone_id: ZoneId) -> bool;

    /// The user's role in the given zone, if they hold an explicit
    /// membership there. Deactivated users hold no role.
    fn role_in_zone(&self, user_id: UserId, zone_id: ZoneId) -> Option<Role>;

    /// The membership flagged primary, else the earliest assignment.
    fn primary_zone(&self, user_id: UserId) -> Option<ZoneId>;
}

impl ZoneDirectory for DirectoryStore {
    fn accessible_zones(&self, user_id: UserId) -> HashSet<ZoneId> {
        match explicit_zones(self, user_id) {
            Ok(zones) => zones,
            Err(e) => {
                warn!(user = %user_id, error = %e, "accessible_zones lookup failed, treating as no access");
                HashSet::new()
            }
        }
    }

    fn is_member(&self, user_id: UserId, zone_id: ZoneId) -> bool {
        self.accessible_zones(user_id).contains(&zone_id)
    }

    fn role_in_zone(&self, user_id: UserId, zone_id: ZoneId) -> Option<Role> {
        match active_role(self, user_id, zone_id) {
            Ok(role) => role,
            Err(e) => {
                warn!(user = %user_id, zone = %zone_id, error = %e, "role lookup failed, treating as no role");
                None
            }
        }
    }

    fn primary_zone(&self, user_id: UserId) -> Option<ZoneId> {
        match self.memberships_of(user_id) {
            Ok(memberships) => memberships
                .iter()
                .find(|m| m.is_primary)
                .or_else(|| memberships.first())
                .map(|m| m.zone_id),
            Err(e) => {
                warn!(user = %user_id, error = %e, "primary zone lookup failed");
                None
            }
        }
    }
}

fn active_role(store: &DirectoryStore, user_id: UserId, zone_id: ZoneId) -> Result<Option<Role>> {
    if !store.user_is_active(user_id)? {
        return Ok(None);
    }
    store.role_of(user_id, zone_id)
}

fn explicit_zones(store: &DirectoryStore, user_id: UserId) -> Result<HashSet<ZoneId>> {
    if !store.user_is_active(user_id)? {
        return Ok(HashSet::new());
    }
    Ok(store
        .memberships_of(user_id)?
        .into_iter()
        .map(|m| m.zone_id)
        .collect())
}

/// Hierarchy-aware variant: each membership also grants its descendant
/// zones. Opt-in at the composition root; the default is explicit
/// memberships only.
pub struct HierarchyDirectory<'a> {
    store: &'a DirectoryStore,
}

impl<'a> HierarchyDirectory<'a> {
    pub fn new(store: &'a DirectoryStore) -> Self {
        Self { store }
    }
}

impl ZoneDirectory for HierarchyDirectory<'_> {
    fn accessible_zones(&self, user_id: UserId) -> HashSet<ZoneId> {
        let mut zones = self.store.accessible_zones(user_id);
        for zone in zones.clone() {
            match self.store.descendants(zone) {
                Ok(below) => zones.extend(below),
                Err(e) => {
                    warn!(zone = %zone, error = %e, "descendant walk failed, granting explicit membership only");
                }
            }
        }
        zones
    }

    fn is_member(&self, user_id: UserId, zone_id: ZoneId) -> bool {
        self.accessible_zones(user_id).contains(&zone_id)
    }

    fn role_in_zone(&self, user_id: UserId, zone_id: ZoneId) -> Option<Role> {
        // Roles do not inherit down the tree; an inherited zone has no role.
        self.store.role_in_zone(user_id, zone_id)
    }

    fn primary_zone(&self, user_id: UserId) -> Option<ZoneId> {
        self.store.primary_zone(user_id)
    }
}
