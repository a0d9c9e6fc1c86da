//! Domain types for the tenant hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// A unique identifier for a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneId(pub Uuid);

impl ZoneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ZoneId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ZoneId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Depth of a zone in the tenant tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneLevel {
    Root,
    Region,
    Branch,
    Team,
}

impl ZoneLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneLevel::Root => "root",
            ZoneLevel::Region => "region",
            ZoneLevel::Branch => "branch",
            ZoneLevel::Team => "team",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "root" => Some(ZoneLevel::Root),
            "region" => Some(ZoneLevel::Region),
            "branch" => Some(ZoneLevel::Branch),
            "team" => Some(ZoneLevel::Team),
            _ => None,
        }
    }
}

/// A node in the tenant tree. `parent_id` is `None` only for the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub parent_id: Option<ZoneId>,
    pub code: String,
    pub name: String,
    pub level: ZoneLevel,
    /// Free-form attributes (address, timezone, ...). Opaque to this crate.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Zone {
    pub fn new(code: impl Into<String>, name: impl Into<String>, level: ZoneLevel) -> Self {
        Self {
            id: ZoneId::new(),
            parent_id: None,
            code: code.into(),
            name: name.into(),
            level,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_parent(mut self, parent: ZoneId) -> Self {
        self.parent_id = Some(parent);
        self
    }
}

/// Named role bundle. Capability grants hang off roles, not users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    ZoneAdmin,
    Manager,
    Staff,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::ZoneAdmin => "zone_admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "super_admin" => Some(Role::SuperAdmin),
            "zone_admin" => Some(Role::ZoneAdmin),
            "manager" => Some(Role::Manager),
            "staff" => Some(Role::Staff),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A known identity. Identity fields are immutable; only `active` changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub active: bool,
}

impl User {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            display_name: display_name.into(),
            active: true,
        }
    }
}

/// A (user, zone, role) binding — the unit of zone access.
///
/// At most one of a user's memberships carries `is_primary`; the store
/// enforces this on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub zone_id: ZoneId,
    pub role: Role,
    pub is_primary: bool,
    pub assigned_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: UserId, zone_id: ZoneId, role: Role) -> Self {
        Self {
            user_id,
            zone_id,
            role,
            is_primary: false,
            assigned_at: Utc::now(),
        }
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}
