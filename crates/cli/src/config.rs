//! Seed configuration loading from warden.toml.

use directory::{DirectoryStore, Membership, Role, User, UserId, Zone, ZoneId, ZoneLevel};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level seed configuration: the zone tree, known users, their
/// memberships, and the role → capability grant table.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub zones: Vec<ZoneEntry>,

    #[serde(default)]
    pub users: Vec<UserEntry>,

    #[serde(default)]
    pub memberships: Vec<MembershipEntry>,

    /// Role name → granted capability codes.
    #[serde(default)]
    pub grants: BTreeMap<String, Vec<String>>,
}

/// One zone; `parent` refers to an earlier entry's `code`.
#[derive(Debug, Deserialize)]
pub struct ZoneEntry {
    pub code: String,
    pub name: String,
    pub level: String,
    pub parent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserEntry {
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// One membership; `user` and `zone` refer to entries above.
#[derive(Debug, Deserialize)]
pub struct MembershipEntry {
    pub user: String,
    pub zone: String,
    pub role: String,
    #[serde(default)]
    pub primary: bool,
}

/// What a seed run created, for printing generated ids.
#[derive(Debug, Default)]
pub struct SeedSummary {
    pub zones: Vec<(String, ZoneId)>,
    pub users: Vec<(String, UserId)>,
    pub memberships: usize,
    pub grants: usize,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply the configuration to a directory store. Zones are inserted in
    /// file order, so a parent must appear before its children.
    pub fn apply(&self, store: &DirectoryStore) -> Result<SeedSummary, ConfigError> {
        let mut summary = SeedSummary::default();

        for entry in &self.zones {
            let level = ZoneLevel::parse(&entry.level)
                .ok_or_else(|| ConfigError::UnknownLevel(entry.level.clone()))?;
            let mut zone = Zone::new(&entry.code, &entry.name, level);
            if let Some(parent_code) = &entry.parent {
                let parent = lookup_zone(store, &summary, parent_code)?;
                zone = zone.with_parent(parent);
            }
            store.add_zone(&zone)?;
            summary.zones.push((entry.code.clone(), zone.id));
        }

        for entry in &self.users {
            let mut user = User::new(&entry.name);
            user.active = entry.active;
            store.add_user(&user)?;
            summary.users.push((entry.name.clone(), user.id));
        }

        for entry in &self.memberships {
            let role = Role::parse(&entry.role)
                .ok_or_else(|| ConfigError::UnknownRole(entry.role.clone()))?;
            let user = summary
                .users
                .iter()
                .find(|(name, _)| name == &entry.user)
                .map(|(_, id)| *id)
                .ok_or_else(|| ConfigError::UnknownUser(entry.user.clone()))?;
            let zone = lookup_zone(store, &summary, &entry.zone)?;
            let mut membership = Membership::new(user, zone, role);
            membership.is_primary = entry.primary;
            store.add_membership(&membership)?;
            summary.memberships += 1;
        }

        for (role_name, codes) in &self.grants {
            let role = Role::parse(role_name)
                .ok_or_else(|| ConfigError::UnknownRole(role_name.clone()))?;
            for code in codes {
                store.grant_capability(role, code)?;
                summary.grants += 1;
            }
        }

        Ok(summary)
    }
}

fn lookup_zone(
    store: &DirectoryStore,
    summary: &SeedSummary,
    code: &str,
) -> Result<ZoneId, ConfigError> {
    if let Some((_, id)) = summary.zones.iter().find(|(c, _)| c == code) {
        return Ok(*id);
    }
    // Re-seeding against an existing database: fall back to stored zones.
    store
        .zone_by_code(code)?
        .ok_or_else(|| ConfigError::UnknownZone(code.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("unknown zone level: {0}")]
    UnknownLevel(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown zone code: {0}")]
    UnknownZone(String),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error(transparent)]
    Directory(#[from] directory::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use directory::ZoneDirectory;

    const SAMPLE: &str = r#"
[[zones]]
code = "hq"
name = "Headquarters"
level = "root"

[[zones]]
code = "emea"
name = "EMEA"
level = "region"
parent = "hq"

[[users]]
name = "avery"

[[memberships]]
user = "avery"
zone = "emea"
role = "manager"
primary = true

[grants]
manager = ["lead.read", "lead.assign"]
staff = ["lead.read"]
"#;

    #[test]
    fn test_apply_sample() {
        let config = Config::parse(SAMPLE).unwrap();
        let store = DirectoryStore::in_memory().unwrap();
        let summary = config.apply(&store).unwrap();

        assert_eq!(summary.zones.len(), 2);
        assert_eq!(summary.users.len(), 1);
        assert_eq!(summary.memberships, 1);
        assert_eq!(summary.grants, 3);

        let avery = summary.users[0].1;
        let emea = summary.zones[1].1;
        assert_eq!(store.role_in_zone(avery, emea), Some(Role::Manager));
        assert_eq!(store.primary_zone(avery), Some(emea));
        assert_eq!(
            store.capabilities_for_role(Role::Staff).unwrap(),
            vec!["lead.read"]
        );
    }

    #[test]
    fn test_unknown_role_rejected() {
        let config = Config::parse(
            r#"
[grants]
superboss = ["lead.read"]
"#,
        )
        .unwrap();
        let store = DirectoryStore::in_memory().unwrap();
        let err = config.apply(&store).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRole(role) if role == "superboss"));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let config = Config::parse(
            r#"
[[zones]]
code = "team-1"
name = "Team One"
level = "team"
parent = "nowhere"
"#,
        )
        .unwrap();
        let store = DirectoryStore::in_memory().unwrap();
        let err = config.apply(&store).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownZone(code) if code == "nowhere"));
    }
}
