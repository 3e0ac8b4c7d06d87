//! In-process engine speaking the same contract as Permify.
//!
//! Used by tests and local development. Tenants are isolated; each tenant
//! keeps every published schema by version and an append-only tuple log
//! stamped with a revision. A snap token is the revision it was issued at,
//! so nothing has to be kept per token.

use crate::{
    engine::{PermissionEngine, OP_DATA_WRITE, OP_PERMISSION_CHECK, OP_SCHEMA_WRITE},
    error::{AuthzError, OperationContext, Result},
    models::*,
    schema::{PermissionExpr, SchemaDefinition},
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

// gRPC status codes, as Permify reports them in error bodies
const CODE_INVALID_ARGUMENT: i32 = 3;
const CODE_NOT_FOUND: i32 = 5;
const CODE_FAILED_PRECONDITION: i32 = 9;

const SNAP_TOKEN_PREFIX: &str = "rev.";

fn encode_snap_token(revision: u64) -> SnapToken {
    SnapToken::new(format!("{}{:x}", SNAP_TOKEN_PREFIX, revision))
}

fn decode_snap_token(token: &SnapToken) -> Option<u64> {
    let hex = token.as_str().strip_prefix(SNAP_TOKEN_PREFIX)?;
    u64::from_str_radix(hex, 16).ok()
}

#[derive(Default)]
struct TenantState {
    schemas: HashMap<String, Arc<SchemaDefinition>>,
    latest_schema: Option<String>,
    /// (entity type, entity id, relation) -> subjects with the revision they were written at
    tuples: HashMap<(String, String, String), Vec<(SubjectRef, u64)>>,
    head: u64,
    settled: u64,
}

impl TenantState {
    fn resolve_schema(&self, version: Option<&SchemaVersion>) -> std::result::Result<Arc<SchemaDefinition>, String> {
        let key = match version {
            Some(v) => v.as_str(),
            None => self
                .latest_schema
                .as_deref()
                .ok_or_else(|| "ERROR_CODE_SCHEMA_NOT_FOUND: no schema written for tenant".to_string())?,
        };
        self.schemas
            .get(key)
            .cloned()
            .ok_or_else(|| format!("ERROR_CODE_SCHEMA_NOT_FOUND: unknown schema version '{}'", key))
    }
}

/// Shared-nothing in-memory [`PermissionEngine`]
pub struct InMemoryEngine {
    tenants: Arc<DashMap<String, TenantState>>,
    lagging_reads: bool,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self {
            tenants: Arc::new(DashMap::new()),
            lagging_reads: false,
        }
    }

    /// Checks without a snap token only observe writes made visible by
    /// [`InMemoryEngine::settle`], like a replica that has not caught up.
    pub fn with_lagging_reads() -> Self {
        Self {
            tenants: Arc::new(DashMap::new()),
            lagging_reads: true,
        }
    }

    /// Make every write so far visible to token-less checks.
    pub fn settle(&self) {
        for mut tenant in self.tenants.iter_mut() {
            tenant.settled = tenant.head;
        }
    }

    /// Number of distinct tuples stored for a tenant
    pub fn tuple_count(&self, tenant: &TenantId) -> usize {
        self.tenants
            .get(tenant.as_str())
            .map(|state| state.tuples.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermissionEngine for InMemoryEngine {
    async fn write_schema(&self, tenant: &TenantId, schema: &str) -> Result<SchemaVersion> {
        let context = OperationContext::new(OP_SCHEMA_WRITE, tenant.as_str());
        let definition = SchemaDefinition::parse(schema)
            .map_err(|e| AuthzError::engine(context, CODE_INVALID_ARGUMENT, e.to_string()))?;

        let version = Uuid::new_v4().simple().to_string();
        let mut state = self.tenants.entry(tenant.as_str().to_string()).or_default();
        state.schemas.insert(version.clone(), Arc::new(definition));
        state.latest_schema = Some(version.clone());

        debug!(tenant = %tenant, schema_version = %version, "Stored schema");
        Ok(SchemaVersion::new(version))
    }

    async fn write_relationships(&self, tenant: &TenantId, request: RelationshipWriteRequest) -> Result<SnapToken> {
        let mut context = OperationContext::new(OP_DATA_WRITE, tenant.as_str());
        if let Some(first) = request.tuples.first() {
            context = context.with_entity(&first.entity);
        }

        let mut state = self.tenants.entry(tenant.as_str().to_string()).or_default();
        let schema = state
            .resolve_schema(request.schema_version.as_ref())
            .map_err(|message| AuthzError::engine(context.clone(), CODE_NOT_FOUND, message))?;

        // Reject the whole batch before storing any of it
        for tuple in &request.tuples {
            schema
                .validate_tuple(tuple)
                .map_err(|message| AuthzError::engine(context.clone(), CODE_INVALID_ARGUMENT, message))?;
        }

        state.head += 1;
        let revision = state.head;
        for tuple in request.tuples {
            let key = (tuple.entity.entity_type, tuple.entity.id, tuple.relation);
            let subjects = state.tuples.entry(key).or_default();
            if !subjects.iter().any(|(existing, _)| *existing == tuple.subject) {
                subjects.push((tuple.subject, revision));
            }
        }
        if !self.lagging_reads {
            state.settled = revision;
        }

        Ok(encode_snap_token(revision))
    }

    async fn check(&self, tenant: &TenantId, request: CheckRequest) -> Result<CheckResult> {
        let context = OperationContext::new(OP_PERMISSION_CHECK, tenant.as_str()).with_entity(&request.entity);

        let state = self
            .tenants
            .get(tenant.as_str())
            .ok_or_else(|| AuthzError::engine(context.clone(), CODE_NOT_FOUND, "ERROR_CODE_SCHEMA_NOT_FOUND: unknown tenant"))?;
        let schema = state
            .resolve_schema(request.schema_version.as_ref())
            .map_err(|message| AuthzError::engine(context.clone(), CODE_NOT_FOUND, message))?;

        let revision = match request.snap_token {
            Some(ref token) => {
                let at = decode_snap_token(token).filter(|at| *at <= state.head).ok_or_else(|| {
                    AuthzError::engine(
                        context.clone(),
                        CODE_INVALID_ARGUMENT,
                        format!("ERROR_CODE_INVALID_SNAP_TOKEN: '{}'", token),
                    )
                })?;
                at.max(state.settled)
            }
            None => state.settled,
        };

        let evaluator = Evaluator {
            schema: &schema,
            state: &state,
            revision,
        };
        let allowed = evaluator
            .has(&request.entity, &request.permission, &request.subject, request.depth)
            .map_err(|message| AuthzError::engine(context.clone(), CODE_FAILED_PRECONDITION, message))?;

        debug!(
            tenant = %tenant,
            entity = %request.entity,
            permission = %request.permission,
            subject = %request.subject,
            revision,
            allowed,
            "Evaluated check"
        );

        Ok(if allowed { CheckResult::Allowed } else { CheckResult::Denied })
    }
}

/// Depth-bounded evaluation over one revision of a tenant's tuples.
/// Every relation or permission lookup consumes one unit of depth.
struct Evaluator<'a> {
    schema: &'a SchemaDefinition,
    state: &'a TenantState,
    revision: u64,
}

impl Evaluator<'_> {
    fn has(&self, entity: &EntityRef, name: &str, subject: &SubjectRef, depth: u32) -> std::result::Result<bool, String> {
        if depth == 0 {
            return Err("ERROR_CODE_DEPTH_NOT_ENOUGH: depth limit reached".to_string());
        }

        let definition = self
            .schema
            .entity(&entity.entity_type)
            .ok_or_else(|| format!("ERROR_CODE_ENTITY_TYPE_NOT_FOUND: '{}'", entity.entity_type))?;

        if definition.relations.contains_key(name) {
            return self.has_relation(entity, name, subject, depth);
        }
        match definition.permissions.get(name) {
            Some(permission) => self.eval(&permission.expr, entity, subject, depth - 1),
            None => Err(format!(
                "ERROR_CODE_PERMISSION_NOT_FOUND: '{}' on entity '{}'",
                name, entity.entity_type
            )),
        }
    }

    fn has_relation(&self, entity: &EntityRef, relation: &str, subject: &SubjectRef, depth: u32) -> std::result::Result<bool, String> {
        for tuple_subject in self.visible(entity, relation) {
            if tuple_subject == subject {
                return Ok(true);
            }
            if let Some(ref userset) = tuple_subject.relation {
                if self.has(&tuple_subject.as_entity(), userset, subject, depth - 1)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn eval(&self, expr: &PermissionExpr, entity: &EntityRef, subject: &SubjectRef, depth: u32) -> std::result::Result<bool, String> {
        match expr {
            PermissionExpr::Ref(name) => self.has(entity, name, subject, depth),
            PermissionExpr::Traverse { relation, target } => {
                for related in self.visible(entity, relation) {
                    if self.has(&related.as_entity(), target, subject, depth)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            PermissionExpr::Or(l, r) => Ok(self.eval(l, entity, subject, depth)? || self.eval(r, entity, subject, depth)?),
            PermissionExpr::And(l, r) => Ok(self.eval(l, entity, subject, depth)? && self.eval(r, entity, subject, depth)?),
            PermissionExpr::Exclude(base, excluded) => {
                Ok(self.eval(base, entity, subject, depth)? && !self.eval(excluded, entity, subject, depth)?)
            }
        }
    }

    fn visible<'s>(&'s self, entity: &EntityRef, relation: &str) -> impl Iterator<Item = &'s SubjectRef> + 's {
        let revision = self.revision;
        self.state
            .tuples
            .get(&(entity.entity_type.clone(), entity.id.clone(), relation.to_string()))
            .into_iter()
            .flatten()
            .filter(move |(_, written_at)| *written_at <= revision)
            .map(|(subject, _)| subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DEFAULT_SCHEMA;

    fn check_request(entity: EntityRef, permission: &str, user: &str, snap_token: Option<SnapToken>) -> CheckRequest {
        CheckRequest {
            entity,
            permission: permission.to_string(),
            subject: SubjectRef::new("user", user),
            schema_version: None,
            snap_token,
            depth: 50,
        }
    }

    fn write(tuple: RelationTuple) -> RelationshipWriteRequest {
        RelationshipWriteRequest {
            schema_version: None,
            tuples: vec![tuple],
        }
    }

    const USERSET_SCHEMA: &str = r#"
entity user {}

entity domain {
    relation member @user
    relation admin @user
}

entity post {
    relation member @user @domain#member
    relation admin @user

    action view = member or admin
    action edit = admin
}
"#;

    #[tokio::test]
    async fn test_direct_and_userset() {
        let engine = InMemoryEngine::new();
        let tenant = TenantId::default();
        engine.write_schema(&tenant, USERSET_SCHEMA).await.unwrap();

        engine
            .write_relationships(
                &tenant,
                write(RelationTuple::new(EntityRef::domain("d1"), "member", SubjectRef::new("user", "u1"))),
            )
            .await
            .unwrap();
        // everyone who is a member of d1 is a member of p1
        engine
            .write_relationships(
                &tenant,
                write(RelationTuple::new(
                    EntityRef::post("p1"),
                    "member",
                    SubjectRef::userset("domain", "d1", "member"),
                )),
            )
            .await
            .unwrap();

        let view = engine
            .check(&tenant, check_request(EntityRef::post("p1"), "view", "u1", None))
            .await
            .unwrap();
        assert_eq!(view, CheckResult::Allowed);

        let edit = engine
            .check(&tenant, check_request(EntityRef::post("p1"), "edit", "u1", None))
            .await
            .unwrap();
        assert_eq!(edit, CheckResult::Denied);

        let outsider = engine
            .check(&tenant, check_request(EntityRef::post("p1"), "view", "u2", None))
            .await
            .unwrap();
        assert_eq!(outsider, CheckResult::Denied);
    }

    #[tokio::test]
    async fn test_snap_token_from_the_future_is_rejected() {
        let engine = InMemoryEngine::new();
        let tenant = TenantId::default();
        engine.write_schema(&tenant, DEFAULT_SCHEMA).await.unwrap();

        let token = engine
            .write_relationships(
                &tenant,
                write(RelationTuple::new(EntityRef::domain("d1"), "admin", SubjectRef::new("user", "u1"))),
            )
            .await
            .unwrap();
        assert_eq!(decode_snap_token(&token), Some(1));

        let err = engine
            .check(
                &tenant,
                check_request(EntityRef::domain("d1"), "edit", "u1", Some(encode_snap_token(7))),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("INVALID_SNAP_TOKEN"));
    }

    #[tokio::test]
    async fn test_rejects_tuple_outside_schema() {
        let engine = InMemoryEngine::new();
        let tenant = TenantId::default();
        engine.write_schema(&tenant, DEFAULT_SCHEMA).await.unwrap();

        let err = engine
            .write_relationships(
                &tenant,
                write(RelationTuple::new(EntityRef::domain("d1"), "owner", SubjectRef::new("user", "u1"))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Engine { code: CODE_INVALID_ARGUMENT, .. }));
        assert_eq!(engine.tuple_count(&tenant), 0);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let engine = InMemoryEngine::new();
        let a = TenantId::new("a");
        let b = TenantId::new("b");
        engine.write_schema(&a, DEFAULT_SCHEMA).await.unwrap();
        engine.write_schema(&b, DEFAULT_SCHEMA).await.unwrap();

        engine
            .write_relationships(
                &a,
                write(RelationTuple::new(EntityRef::domain("d1"), "admin", SubjectRef::new("user", "u1"))),
            )
            .await
            .unwrap();

        let in_b = engine
            .check(&b, check_request(EntityRef::domain("d1"), "edit", "u1", None))
            .await
            .unwrap();
        assert_eq!(in_b, CheckResult::Denied);
    }

    #[tokio::test]
    async fn test_lagging_reads_need_snap_token() {
        let engine = InMemoryEngine::with_lagging_reads();
        let tenant = TenantId::default();
        engine.write_schema(&tenant, DEFAULT_SCHEMA).await.unwrap();

        let token = engine
            .write_relationships(
                &tenant,
                write(RelationTuple::new(EntityRef::domain("d1"), "admin", SubjectRef::new("user", "u1"))),
            )
            .await
            .unwrap();

        let stale = engine
            .check(&tenant, check_request(EntityRef::domain("d1"), "edit", "u1", None))
            .await
            .unwrap();
        assert_eq!(stale, CheckResult::Denied);

        let fresh = engine
            .check(&tenant, check_request(EntityRef::domain("d1"), "edit", "u1", Some(token)))
            .await
            .unwrap();
        assert_eq!(fresh, CheckResult::Allowed);

        engine.settle();
        let settled = engine
            .check(&tenant, check_request(EntityRef::domain("d1"), "edit", "u1", None))
            .await
            .unwrap();
        assert_eq!(settled, CheckResult::Allowed);
    }

    #[tokio::test]
    async fn test_unknown_snap_token_and_version() {
        let engine = InMemoryEngine::new();
        let tenant = TenantId::default();
        engine.write_schema(&tenant, DEFAULT_SCHEMA).await.unwrap();

        let err = engine
            .check(
                &tenant,
                check_request(EntityRef::domain("d1"), "view", "u1", Some(SnapToken::new("bogus"))),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("INVALID_SNAP_TOKEN"));

        let mut request = check_request(EntityRef::domain("d1"), "view", "u1", None);
        request.schema_version = Some(SchemaVersion::new("missing"));
        let err = engine.check(&tenant, request).await.unwrap_err();
        assert!(matches!(err, AuthzError::Engine { code: CODE_NOT_FOUND, .. }));
    }

    #[tokio::test]
    async fn test_invalid_schema_is_engine_error() {
        let engine = InMemoryEngine::new();
        let err = engine
            .write_schema(&TenantId::default(), "entity post { relation owner @nobody }")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Engine { .. }));
    }
}
