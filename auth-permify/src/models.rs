use serde::{Deserialize, Serialize};
use std::fmt;

/// Tenant used whenever a caller passes an empty tenant id.
pub const DEFAULT_TENANT: &str = "t1";

/// Isolation boundary for schema and relationship data in the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Empty or whitespace-only input resolves to [`DEFAULT_TENANT`].
    pub fn new(id: &str) -> Self {
        let id = id.trim();
        if id.is_empty() {
            Self(DEFAULT_TENANT.to_string())
        } else {
            Self(id.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self(DEFAULT_TENANT.to_string())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A principal or protected resource, e.g. `post:42`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(entity_type: &str, id: &str) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    pub fn user(id: &str) -> Self {
        Self::new(EntityKind::User.as_str(), id)
    }

    pub fn domain(id: &str) -> Self {
        Self::new(EntityKind::Domain.as_str(), id)
    }

    pub fn post(id: &str) -> Self {
        Self::new(EntityKind::Post.as_str(), id)
    }

    /// The closed entity kind, if this reference names one of the types
    /// declared by the default schema.
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::parse(&self.entity_type)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}

/// Subject side of a tuple. With a relation set it is a userset
/// (`domain:d1#member`), otherwise a single principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    #[serde(rename = "type")]
    pub subject_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

impl SubjectRef {
    pub fn new(subject_type: &str, id: &str) -> Self {
        Self {
            subject_type: subject_type.to_string(),
            id: id.to_string(),
            relation: None,
        }
    }

    pub fn userset(subject_type: &str, id: &str, relation: &str) -> Self {
        Self {
            subject_type: subject_type.to_string(),
            id: id.to_string(),
            relation: Some(relation.to_string()),
        }
    }

    pub fn as_entity(&self) -> EntityRef {
        EntityRef::new(&self.subject_type, &self.id)
    }
}

impl From<&EntityRef> for SubjectRef {
    fn from(entity: &EntityRef) -> Self {
        Self::new(&entity.entity_type, &entity.id)
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.relation {
            Some(ref relation) => write!(f, "{}:{}#{}", self.subject_type, self.id, relation),
            None => write!(f, "{}:{}", self.subject_type, self.id),
        }
    }
}

/// "subject has relation on entity"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationTuple {
    pub entity: EntityRef,
    pub relation: String,
    pub subject: SubjectRef,
}

impl RelationTuple {
    pub fn new(entity: EntityRef, relation: &str, subject: SubjectRef) -> Self {
        Self {
            entity,
            relation: relation.to_string(),
            subject,
        }
    }
}

impl fmt::Display for RelationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.entity, self.relation, self.subject)
    }
}

/// Immutable snapshot identifier of a published schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Consistency token. A check carrying it observes every relationship write
/// that produced or preceded it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapToken(String);

impl SnapToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tri-state result reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckResult {
    #[serde(rename = "CHECK_RESULT_ALLOWED")]
    Allowed,
    #[serde(rename = "CHECK_RESULT_DENIED")]
    Denied,
    #[serde(rename = "CHECK_RESULT_UNSPECIFIED")]
    Unspecified,
}

impl CheckResult {
    /// Only an explicit allow grants access.
    pub fn is_allowed(self) -> bool {
        matches!(self, CheckResult::Allowed)
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "CHECK_RESULT_ALLOWED" => CheckResult::Allowed,
            "CHECK_RESULT_DENIED" => CheckResult::Denied,
            _ => CheckResult::Unspecified,
        }
    }
}

impl Default for CheckResult {
    fn default() -> Self {
        CheckResult::Unspecified
    }
}

impl<'de> Deserialize<'de> for CheckResult {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&value))
    }
}

/// Request sent to the engine's check operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub entity: EntityRef,
    pub permission: String,
    pub subject: SubjectRef,
    pub schema_version: Option<SchemaVersion>,
    pub snap_token: Option<SnapToken>,
    pub depth: u32,
}

/// Batch of tuples for the engine's relationship write operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipWriteRequest {
    pub schema_version: Option<SchemaVersion>,
    pub tuples: Vec<RelationTuple>,
}

/// Entity types declared by the default schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Domain,
    Post,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Domain => "domain",
            EntityKind::Post => "post",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(EntityKind::User),
            "domain" => Some(EntityKind::Domain),
            "post" => Some(EntityKind::Post),
            _ => None,
        }
    }

    /// Whether the kind declares role relations (`member`, `admin`).
    pub fn accepts_roles(self) -> bool {
        matches!(self, EntityKind::Domain | EntityKind::Post)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role relations a user can hold on a domain or post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions checked against domains and posts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    View,
    Edit,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Edit => "edit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "view" => Some(Permission::View),
            "edit" => Some(Permission::Edit),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tenant_falls_back_to_default() {
        assert_eq!(TenantId::new("").as_str(), DEFAULT_TENANT);
        assert_eq!(TenantId::new("  ").as_str(), DEFAULT_TENANT);
        assert_eq!(TenantId::new("acme").as_str(), "acme");
    }

    #[test]
    fn test_check_result_wire_names() {
        let allowed: CheckResult = serde_json::from_str("\"CHECK_RESULT_ALLOWED\"").unwrap();
        assert!(allowed.is_allowed());

        let denied: CheckResult = serde_json::from_str("\"CHECK_RESULT_DENIED\"").unwrap();
        assert!(!denied.is_allowed());

        // Anything the engine invents later must not be read as an allow
        let future: CheckResult = serde_json::from_str("\"CHECK_RESULT_MAYBE\"").unwrap();
        assert_eq!(future, CheckResult::Unspecified);
    }

    #[test]
    fn test_display_formats() {
        let tuple = RelationTuple::new(
            EntityRef::post("p1"),
            "parent",
            SubjectRef::userset("domain", "d1", "member"),
        );
        assert_eq!(tuple.to_string(), "post:p1#parent@domain:d1#member");
    }
}
