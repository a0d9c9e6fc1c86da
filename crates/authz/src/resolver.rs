//! Capability resolution.

use crate::CORE_USER_READ;
use directory::{DirectoryStore, Result, UserId};
use std::collections::HashSet;
use tracing::warn;

/// Resolves a user's flattened capability set from their role grants.
///
/// Resolution is per-user, not per-(user, zone): a user with manager in
/// zone A and staff in zone B gets the union of both roles' grants, usable
/// anywhere their memberships reach. That is intentional — whether a user
/// *ever* holds a capability and whether a *specific entity's zone* is
/// reachable are separate questions, and the engine requires both answers
/// to be yes.
pub struct CapabilityResolver<'a> {
    store: &'a DirectoryStore,
}

impl<'a> CapabilityResolver<'a> {
    pub fn new(store: &'a DirectoryStore) -> Self {
        Self { store }
    }

    /// Union of capability grants across every membership's role, plus the
    /// universal [`CORE_USER_READ`] baseline. Deactivated users keep only
    /// the baseline, and so does anyone whose lookup fails; missing
    /// capabilities can only deny.
    pub fn capabilities_of(&self, user_id: UserId) -> HashSet<String> {
        match self.resolve(user_id) {
            Ok(capabilities) => capabilities,
            Err(e) => {
                warn!(user = %user_id, error = %e, "capability resolution failed, falling back to baseline");
                HashSet::from([CORE_USER_READ.to_string()])
            }
        }
    }

    pub fn has_capability(&self, user_id: UserId, code: &str) -> bool {
        self.capabilities_of(user_id).contains(code)
    }

    fn resolve(&self, user_id: UserId) -> Result<HashSet<String>> {
        let mut capabilities = HashSet::from([CORE_USER_READ.to_string()]);
        if !self.store.user_is_active(user_id)? {
            return Ok(capabilities);
        }
        let mut seen_roles = HashSet::new();
        for membership in self.store.memberships_of(user_id)? {
            if seen_roles.insert(membership.role) {
                capabilities.extend(self.store.capabilities_for_role(membership.role)?);
            }
        }
        Ok(capabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use directory::{Membership, Role, User, ZoneId};

    fn store_with_grants() -> DirectoryStore {
        let store = DirectoryStore::in_memory().unwrap();
        store.grant_capability(Role::Staff, "lead.read").unwrap();
        store.grant_capability(Role::Staff, "lead.create").unwrap();
        store.grant_capability(Role::Manager, "lead.read").unwrap();
        store.grant_capability(Role::Manager, "lead.assign").unwrap();
        store
    }

    fn member(store: &DirectoryStore, role: Role) -> UserId {
        let user = User::new("someone");
        store.add_user(&user).unwrap();
        store
            .add_membership(&Membership::new(user.id, ZoneId::new(), role))
            .unwrap();
        user.id
    }

    #[test]
    fn test_baseline_granted_without_any_role() {
        let store = store_with_grants();
        let user = User::new("no roles");
        store.add_user(&user).unwrap();

        let caps = CapabilityResolver::new(&store).capabilities_of(user.id);
        assert_eq!(caps, HashSet::from([CORE_USER_READ.to_string()]));
    }

    #[test]
    fn test_union_across_zone_roles() {
        let store = store_with_grants();
        let user = member(&store, Role::Staff);
        store
            .add_membership(&Membership::new(user, ZoneId::new(), Role::Manager))
            .unwrap();

        let resolver = CapabilityResolver::new(&store);
        let caps = resolver.capabilities_of(user);
        for code in ["lead.read", "lead.create", "lead.assign", CORE_USER_READ] {
            assert!(caps.contains(code), "missing {code}");
        }
        assert!(resolver.has_capability(user, "lead.assign"));
        assert!(!resolver.has_capability(user, "lead.delete"));
    }

    #[test]
    fn test_deactivated_user_keeps_only_baseline() {
        let store = store_with_grants();
        let user = member(&store, Role::Manager);
        let resolver = CapabilityResolver::new(&store);
        assert!(resolver.has_capability(user, "lead.assign"));

        store.set_user_active(user, false).unwrap();
        assert_eq!(
            resolver.capabilities_of(user),
            HashSet::from([CORE_USER_READ.to_string()])
        );
        assert!(!resolver.has_capability(user, "lead.assign"));
    }

    #[test]
    fn test_repeated_resolution_is_stable() {
        let store = store_with_grants();
        let user = member(&store, Role::Staff);

        let resolver = CapabilityResolver::new(&store);
        assert_eq!(resolver.capabilities_of(user), resolver.capabilities_of(user));
    }
}
