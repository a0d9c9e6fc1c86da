//! Capability codes and the startup-validated registry.

use crate::Result;
use directory::DirectoryStore;
use std::collections::HashSet;

/// Baseline capability held by every authenticated user, regardless of
/// role. Deliberate universal grant: anyone who can log in may read their
/// own user record.
pub const CORE_USER_READ: &str = "core.user.read";

/// Synthesize the conventional `entity.action` code.
pub fn capability_code(entity_type: &str, action: &str) -> String {
    format!("{entity_type}.{action}")
}

/// The set of capability codes the grant tables actually know about.
///
/// Capability strings are built dynamically from entity type and action, so
/// a typo would otherwise just deny everything and look like a permission
/// problem. Loading the registry once at startup and calling [`verify`]
/// with every code the application intends to use turns that typo into a
/// hard error instead.
///
/// [`verify`]: CapabilityRegistry::verify
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    codes: HashSet<String>,
}

impl CapabilityRegistry {
    /// Load every granted code from the directory store, plus the `core.*`
    /// baseline.
    pub fn load(store: &DirectoryStore) -> Result<Self> {
        let mut codes: HashSet<String> = store.granted_codes()?.into_iter().collect();
        codes.insert(CORE_USER_READ.to_string());
        Ok(Self { codes })
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Fail fast on the first code no grant anticipates.
    pub fn verify<'a>(&self, codes: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for code in codes {
            if !self.contains(code) {
                return Err(crate::Error::UnknownCapability(code.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use directory::Role;

    #[test]
    fn test_capability_code_format() {
        assert_eq!(capability_code("lead", "assign"), "lead.assign");
    }

    #[test]
    fn test_registry_catches_typos() {
        let store = DirectoryStore::in_memory().unwrap();
        store.grant_capability(Role::Staff, "lead.create").unwrap();

        let registry = CapabilityRegistry::load(&store).unwrap();
        assert!(registry.contains("lead.create"));
        assert!(registry.contains(CORE_USER_READ));
        assert!(!registry.contains("lead.craete"));

        assert!(registry.verify(["lead.create", CORE_USER_READ]).is_ok());
        let err = registry.verify(["lead.craete"]).unwrap_err();
        assert!(matches!(err, crate::Error::UnknownCapability(code) if code == "lead.craete"));
    }
}
