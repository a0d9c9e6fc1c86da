//! The authorization engine: where zone guard, capability guard, and
//! entity predicates compose.

use crate::{capability_code, CapabilityRegistry, CapabilityResolver, PermissionContext};
use directory::{Role, UserId, ZoneDirectory, ZoneId};
use serde::Serialize;
use tracing::warn;

/// Outcome of an authorization check.
#[derive(Debug, Clone)]
pub enum Decision {
    Allow,
    Deny { reason: DenyReason },
}

impl Decision {
    pub fn deny(reason: DenyReason) -> Self {
        Decision::Deny { reason }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny { reason } => Some(reason),
        }
    }
}

/// Why a check denied.
///
/// The display string is the stable, caller-facing reason; it is
/// deliberately coarse (it never names other zones or what the user is
/// missing beyond the one checked code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    /// The entity's zone is outside the user's accessible set.
    ZoneMismatch,
    /// The user holds no role granting the required code.
    CapabilityMissing { code: String },
    /// Assignment target is not a member of the target zone. The zone is
    /// kept for the forensic audit record.
    AssignmentRejected { target_zone: ZoneId },
    /// A caller-supplied entity rule rejected the action.
    EntityRule { reason: String },
}

impl DenyReason {
    /// Machine-readable code for the 403 body.
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::ZoneMismatch => "ZONE_MISMATCH",
            DenyReason::CapabilityMissing { .. }
            | DenyReason::AssignmentRejected { .. }
            | DenyReason::EntityRule { .. } => "PERMISSION_DENIED",
        }
    }
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::ZoneMismatch => f.write_str("Cross-zone access denied"),
            DenyReason::CapabilityMissing { code } => write!(f, "Missing capability: {code}"),
            DenyReason::AssignmentRejected { .. } => {
                f.write_str("Target user is not in the same zone")
            }
            DenyReason::EntityRule { reason } => f.write_str(reason),
        }
    }
}

/// Stateless composition of the zone guard, the capability guard, and
/// entity-specific predicates.
///
/// The engine holds no cache and no session state; every call re-reads the
/// directory. Admin roles get no automatic bypass here — callers that want
/// an exception ask [`is_super_admin`](Engine::is_super_admin) /
/// [`is_zone_admin`](Engine::is_zone_admin) explicitly, which keeps every
/// bypass visible at its call site and in the audit trail.
///
/// Callers are contractually required to forward every `Deny` to the audit
/// sink before returning their error response.
pub struct Engine<'a> {
    directory: &'a dyn ZoneDirectory,
    resolver: &'a CapabilityResolver<'a>,
    registry: Option<&'a CapabilityRegistry>,
}

impl<'a> Engine<'a> {
    pub fn new(directory: &'a dyn ZoneDirectory, resolver: &'a CapabilityResolver<'a>) -> Self {
        Self {
            directory,
            resolver,
            registry: None,
        }
    }

    /// Attach a registry so synthesized codes that no grant anticipates
    /// are flagged in the operational log.
    pub fn with_registry(mut self, registry: &'a CapabilityRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// The cross-zone guard. Mandatory before any entity read or write.
    pub fn can_access_entity(&self, user_id: UserId, entity_zone: ZoneId) -> Decision {
        if self.directory.accessible_zones(user_id).contains(&entity_zone) {
            Decision::Allow
        } else {
            Decision::deny(DenyReason::ZoneMismatch)
        }
    }

    /// Whether the user holds `code` *and* may reach `zone_id`. The two
    /// conditions are independent; both must hold.
    pub fn has_capability_in_zone(&self, user_id: UserId, code: &str, zone_id: ZoneId) -> bool {
        self.resolver.has_capability(user_id, code) && self.directory.is_member(user_id, zone_id)
    }

    /// Composite check for `<entity_type>.<action>` on an entity living in
    /// `entity_zone`. Strict order: zone guard, then capability guard.
    ///
    /// The ordering is policy, not convenience: a user without zone access
    /// always sees the uniform cross-zone reason and learns nothing about
    /// which capabilities they hold elsewhere.
    pub fn can_perform_action(
        &self,
        user_id: UserId,
        action: &str,
        entity_type: &str,
        entity_zone: ZoneId,
    ) -> Decision {
        self.can_perform_action_with(user_id, action, entity_type, entity_zone, || Decision::Allow)
    }

    /// [`can_perform_action`](Engine::can_perform_action) plus a
    /// caller-supplied predicate for entity-specific rules ("only the
    /// owner or a zone admin may edit"). The predicate runs last and only
    /// if both guards pass.
    pub fn can_perform_action_with<F>(
        &self,
        user_id: UserId,
        action: &str,
        entity_type: &str,
        entity_zone: ZoneId,
        predicate: F,
    ) -> Decision
    where
        F: FnOnce() -> Decision,
    {
        if let Decision::Deny { reason } = self.can_access_entity(user_id, entity_zone) {
            return Decision::deny(reason);
        }

        let code = capability_code(entity_type, action);
        self.warn_unknown_code(&code);
        if !self.resolver.has_capability(user_id, &code) {
            return Decision::deny(DenyReason::CapabilityMissing { code });
        }

        predicate()
    }

    /// Same-zone-only assignment rule. Allows iff the assigner holds
    /// `<entity_type>.assign` usable in `target_zone` *and* the target
    /// user is a member of `target_zone`. There is no override path here;
    /// cross-zone assignment is categorically denied.
    pub fn can_assign_to_user(
        &self,
        assigner_id: UserId,
        target_user_id: UserId,
        target_zone: ZoneId,
        entity_type: &str,
    ) -> Decision {
        if let Decision::Deny { reason } = self.can_access_entity(assigner_id, target_zone) {
            return Decision::deny(reason);
        }
        let code = capability_code(entity_type, "assign");
        self.warn_unknown_code(&code);
        if !self.resolver.has_capability(assigner_id, &code) {
            return Decision::deny(DenyReason::CapabilityMissing { code });
        }
        if !self.directory.is_member(target_user_id, target_zone) {
            return Decision::deny(DenyReason::AssignmentRejected {
                target_zone,
            });
        }
        Decision::Allow
    }

    fn warn_unknown_code(&self, code: &str) {
        if let Some(registry) = self.registry {
            if !registry.contains(code) {
                warn!(%code, "capability code not present in any grant, check for a typo");
            }
        }
    }

    pub fn is_super_admin(&self, user_id: UserId) -> bool {
        self.directory
            .accessible_zones(user_id)
            .into_iter()
            .any(|zone| self.directory.role_in_zone(user_id, zone) == Some(Role::SuperAdmin))
    }

    pub fn is_zone_admin(&self, user_id: UserId, zone_id: ZoneId) -> bool {
        self.directory.role_in_zone(user_id, zone_id) == Some(Role::ZoneAdmin)
    }

    /// Build the per-request snapshot entity services carry around.
    pub fn permission_context(&self, user_id: UserId) -> PermissionContext {
        let primary_zone_id = self.directory.primary_zone(user_id);
        PermissionContext {
            user_id,
            role: primary_zone_id.and_then(|zone| self.directory.role_in_zone(user_id, zone)),
            accessible_zones: self.directory.accessible_zones(user_id),
            capabilities: self.resolver.capabilities_of(user_id),
            primary_zone_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use directory::{DirectoryStore, Membership, Role, User};

    struct Fixture {
        store: DirectoryStore,
    }

    impl Fixture {
        fn new() -> Self {
            let store = DirectoryStore::in_memory().unwrap();
            store.grant_capability(Role::Staff, "lead.read").unwrap();
            store.grant_capability(Role::Staff, "lead.create").unwrap();
            store.grant_capability(Role::Manager, "lead.read").unwrap();
            store.grant_capability(Role::Manager, "lead.assign").unwrap();
            Self { store }
        }

        fn user(&self, role: Role, zone: ZoneId) -> UserId {
            let user = User::new("fixture user");
            self.store.add_user(&user).unwrap();
            self.store
                .add_membership(&Membership::new(user.id, zone, role))
                .unwrap();
            user.id
        }
    }

    macro_rules! engine {
        ($fixture:expr, $resolver:ident, $engine:ident) => {
            let $resolver = CapabilityResolver::new(&$fixture.store);
            let $engine = Engine::new(&$fixture.store, &$resolver);
        };
    }

    #[test]
    fn test_zone_isolation_regardless_of_capabilities() {
        let fixture = Fixture::new();
        let home = ZoneId::new();
        let other = ZoneId::new();
        let manager = fixture.user(Role::Manager, home);
        engine!(fixture, resolver, engine);

        assert!(engine.can_access_entity(manager, home).is_allowed());

        let decision = engine.can_access_entity(manager, other);
        let reason = decision.deny_reason().unwrap();
        assert_eq!(*reason, DenyReason::ZoneMismatch);
        assert_eq!(reason.to_string(), "Cross-zone access denied");
        assert_eq!(reason.code(), "ZONE_MISMATCH");
    }

    #[test]
    fn test_capability_is_zone_independent_but_composite_is_not() {
        let fixture = Fixture::new();
        let zone_a = ZoneId::new();
        let zone_b = ZoneId::new();
        let user = fixture.user(Role::Staff, zone_a);
        engine!(fixture, resolver, engine);

        // Raw capability holds everywhere.
        assert!(resolver.has_capability(user, "lead.create"));
        // But the composite check still fails the zone guard in B, and the
        // reason is the uniform zone reason, not the capability one.
        assert!(engine.can_perform_action(user, "create", "lead", zone_a).is_allowed());
        let decision = engine.can_perform_action(user, "create", "lead", zone_b);
        assert_eq!(*decision.deny_reason().unwrap(), DenyReason::ZoneMismatch);
        assert!(!engine.has_capability_in_zone(user, "lead.create", zone_b));
    }

    #[test]
    fn test_missing_capability_reason_string() {
        let fixture = Fixture::new();
        let zone = ZoneId::new();
        let staff = fixture.user(Role::Staff, zone);
        engine!(fixture, resolver, engine);

        let decision = engine.can_perform_action(staff, "assign", "lead", zone);
        let reason = decision.deny_reason().unwrap();
        assert_eq!(reason.to_string(), "Missing capability: lead.assign");
        assert_eq!(reason.code(), "PERMISSION_DENIED");
    }

    #[test]
    fn test_same_zone_assignment_invariant() {
        let fixture = Fixture::new();
        let zone_1 = ZoneId::new();
        let zone_2 = ZoneId::new();
        let manager = fixture.user(Role::Manager, zone_1);
        let local = fixture.user(Role::Staff, zone_1);
        let remote = fixture.user(Role::Staff, zone_2);
        engine!(fixture, resolver, engine);

        assert!(engine
            .can_assign_to_user(manager, local, zone_1, "lead")
            .is_allowed());

        // Target outside the zone flips the result.
        let decision = engine.can_assign_to_user(manager, remote, zone_1, "lead");
        let reason = decision.deny_reason().unwrap();
        assert_eq!(reason.to_string(), "Target user is not in the same zone");
        assert_eq!(
            *reason,
            DenyReason::AssignmentRejected { target_zone: zone_1 }
        );

        // Assigner without the capability flips it too.
        let staff = fixture.user(Role::Staff, zone_1);
        let decision = engine.can_assign_to_user(staff, local, zone_1, "lead");
        assert_eq!(
            *decision.deny_reason().unwrap(),
            DenyReason::CapabilityMissing {
                code: "lead.assign".into()
            }
        );

        // Assigner outside the zone fails the zone guard first.
        let decision = engine.can_assign_to_user(manager, remote, zone_2, "lead");
        assert_eq!(*decision.deny_reason().unwrap(), DenyReason::ZoneMismatch);
    }

    #[test]
    fn test_revocation_is_visible_on_next_call() {
        let fixture = Fixture::new();
        let zone = ZoneId::new();
        let user = fixture.user(Role::Staff, zone);
        engine!(fixture, resolver, engine);

        assert!(engine.can_access_entity(user, zone).is_allowed());
        fixture.store.remove_membership(user, zone).unwrap();
        assert!(!engine.can_access_entity(user, zone).is_allowed());
    }

    #[test]
    fn test_grant_revocation_is_visible_on_next_call() {
        let fixture = Fixture::new();
        let zone = ZoneId::new();
        let user = fixture.user(Role::Staff, zone);
        engine!(fixture, resolver, engine);

        assert!(engine.can_perform_action(user, "create", "lead", zone).is_allowed());
        fixture
            .store
            .revoke_capability(Role::Staff, "lead.create")
            .unwrap();
        let decision = engine.can_perform_action(user, "create", "lead", zone);
        assert_eq!(
            *decision.deny_reason().unwrap(),
            DenyReason::CapabilityMissing {
                code: "lead.create".into()
            }
        );
    }

    #[test]
    fn test_entity_predicate_runs_last() {
        let fixture = Fixture::new();
        let zone = ZoneId::new();
        let user = fixture.user(Role::Staff, zone);
        engine!(fixture, resolver, engine);

        // Guards pass, predicate decides.
        let decision = engine.can_perform_action_with(user, "create", "lead", zone, || {
            Decision::deny(DenyReason::EntityRule {
                reason: "Only the owner may edit this lead".into(),
            })
        });
        assert_eq!(
            decision.deny_reason().unwrap().to_string(),
            "Only the owner may edit this lead"
        );

        // Zone guard fails: the predicate must not run at all.
        let decision =
            engine.can_perform_action_with(user, "create", "lead", ZoneId::new(), || {
                panic!("predicate evaluated despite failed zone guard")
            });
        assert_eq!(*decision.deny_reason().unwrap(), DenyReason::ZoneMismatch);
    }

    #[test]
    fn test_admin_predicates_grant_no_bypass() {
        let fixture = Fixture::new();
        let zone = ZoneId::new();
        let admin_zone = ZoneId::new();
        let admin = fixture.user(Role::SuperAdmin, admin_zone);
        let zone_admin = fixture.user(Role::ZoneAdmin, zone);
        engine!(fixture, resolver, engine);

        assert!(engine.is_super_admin(admin));
        assert!(engine.is_zone_admin(zone_admin, zone));
        assert!(!engine.is_zone_admin(admin, zone));

        // Being super admin does not open other zones by itself.
        assert!(!engine.can_access_entity(admin, zone).is_allowed());
    }

    #[test]
    fn test_deactivated_user_loses_admin_predicates() {
        let fixture = Fixture::new();
        let zone = ZoneId::new();
        let zone_admin = fixture.user(Role::ZoneAdmin, zone);
        let super_admin = fixture.user(Role::SuperAdmin, zone);
        engine!(fixture, resolver, engine);

        assert!(engine.is_zone_admin(zone_admin, zone));
        fixture.store.set_user_active(zone_admin, false).unwrap();
        assert!(!engine.can_access_entity(zone_admin, zone).is_allowed());
        // The predicate entity services use for same-zone exceptions must
        // agree with the access checks.
        assert!(!engine.is_zone_admin(zone_admin, zone));

        assert!(engine.is_super_admin(super_admin));
        fixture.store.set_user_active(super_admin, false).unwrap();
        assert!(!engine.is_super_admin(super_admin));
    }

    #[test]
    fn test_unknown_assign_code_still_denies() {
        let fixture = Fixture::new();
        let zone = ZoneId::new();
        let manager = fixture.user(Role::Manager, zone);
        let target = fixture.user(Role::Staff, zone);
        let resolver = CapabilityResolver::new(&fixture.store);
        let registry = CapabilityRegistry::load(&fixture.store).unwrap();
        let engine = Engine::new(&fixture.store, &resolver).with_registry(&registry);

        // A typoed entity type goes through the registry check and still
        // denies on the missing capability.
        let decision = engine.can_assign_to_user(manager, target, zone, "laed");
        assert_eq!(
            *decision.deny_reason().unwrap(),
            DenyReason::CapabilityMissing {
                code: "laed.assign".into()
            }
        );
    }

    #[test]
    fn test_permission_context_snapshot() {
        let fixture = Fixture::new();
        let zone = ZoneId::new();
        let other = ZoneId::new();
        let user = fixture.user(Role::Manager, zone);
        fixture
            .store
            .add_membership(&Membership::new(user, other, Role::Staff))
            .unwrap();
        engine!(fixture, resolver, engine);

        let context = engine.permission_context(user);
        assert_eq!(context.user_id, user);
        assert_eq!(context.primary_zone_id, Some(zone));
        assert_eq!(context.role, Some(Role::Manager));
        assert_eq!(context.accessible_zones.len(), 2);
        assert!(context.capabilities.contains("lead.assign"));
        assert!(context.capabilities.contains(crate::CORE_USER_READ));
        assert!(context.can_access(zone) && context.can_access(other));
        assert!(!context.can_access(ZoneId::new()));
    }
}
