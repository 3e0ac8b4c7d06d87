use crate::{
    checker::{CheckParams, PermissionChecker},
    config::AuthzConfig,
    engine::{PermissionEngine, OP_DATA_WRITE, OP_PERMISSION_CHECK, OP_SCHEMA_WRITE},
    error::{AuthzError, Result},
    models::*,
    publisher::SchemaPublisher,
    relationships::RelationshipWriter,
    schema::DEFAULT_SCHEMA,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const PARENT_RELATION: &str = "parent";

/// Typed entry point used by request handlers.
///
/// Built once at startup by [`Authorizer::provision`]; afterwards it only
/// holds immutable state and is cheap to clone.
#[derive(Clone)]
pub struct Authorizer {
    tenant: TenantId,
    schema_version: SchemaVersion,
    writer: RelationshipWriter,
    checker: PermissionChecker,
    write_timeout: Duration,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("tenant", &self.tenant)
            .field("schema_version", &self.schema_version)
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    /// Publish the configured schema (the file at `schema_path`, or
    /// [`DEFAULT_SCHEMA`]) and keep the resulting version.
    pub async fn provision(engine: Arc<dyn PermissionEngine>, config: &AuthzConfig) -> Result<Self> {
        let schema = match config.schema_path {
            Some(ref path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                AuthzError::validation(OP_SCHEMA_WRITE, format!("cannot read schema file {}: {}", path, e))
            })?,
            None => DEFAULT_SCHEMA.to_string(),
        };
        Self::provision_with_schema(engine, config, &schema).await
    }

    pub async fn provision_with_schema(engine: Arc<dyn PermissionEngine>, config: &AuthzConfig, schema: &str) -> Result<Self> {
        let tenant = TenantId::new(&config.tenant_id);
        let schema_version = SchemaPublisher::new(engine.clone())
            .publish(tenant.as_str(), schema, Some(config.schema_timeout()))
            .await?;

        info!(tenant = %tenant, schema_version = %schema_version, "Authorizer provisioned");

        Ok(Self {
            writer: RelationshipWriter::new(engine.clone()).with_schema_version(schema_version.clone()),
            checker: PermissionChecker::new(engine)
                .with_depth(config.depth)
                .with_default_deadline(config.check_timeout()),
            tenant,
            schema_version,
            write_timeout: config.write_timeout(),
        })
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn schema_version(&self) -> &SchemaVersion {
        &self.schema_version
    }

    /// Give `subject` a role on `resource`. Not retried on failure.
    pub async fn grant(&self, subject: &EntityRef, resource: &EntityRef, role: Role) -> Result<SnapToken> {
        expect_kind(OP_DATA_WRITE, subject, |k| k == EntityKind::User, "a user")?;
        expect_kind(OP_DATA_WRITE, resource, EntityKind::accepts_roles, "a domain or post")?;

        let tuple = RelationTuple::new(resource.clone(), role.as_str(), SubjectRef::from(subject));
        let token = self
            .writer
            .write_tuple(self.tenant.as_str(), tuple, Some(self.write_timeout))
            .await?;

        info!(subject = %subject, resource = %resource, role = %role, "Granted role");
        Ok(token)
    }

    /// Place a post inside a domain so domain roles reach the post.
    pub async fn link_parent(&self, resource: &EntityRef, parent: &EntityRef) -> Result<SnapToken> {
        expect_kind(OP_DATA_WRITE, resource, |k| k == EntityKind::Post, "a post")?;
        expect_kind(OP_DATA_WRITE, parent, |k| k == EntityKind::Domain, "a domain")?;

        let tuple = RelationTuple::new(resource.clone(), PARENT_RELATION, SubjectRef::from(parent));
        self.writer
            .write_tuple(self.tenant.as_str(), tuple, Some(self.write_timeout))
            .await
    }

    /// Check `permission` pinned to the provisioned schema version. Pass the
    /// snap token of the resource's latest write to see that write.
    pub async fn authorize(
        &self,
        subject: &EntityRef,
        resource: &EntityRef,
        permission: Permission,
        snap_token: Option<&SnapToken>,
    ) -> Result<bool> {
        expect_kind(OP_PERMISSION_CHECK, subject, |k| k == EntityKind::User, "a user")?;
        expect_kind(OP_PERMISSION_CHECK, resource, EntityKind::accepts_roles, "a domain or post")?;

        let params = CheckParams {
            tenant: self.tenant.clone(),
            subject: subject.clone(),
            resource: resource.clone(),
            permission: permission.as_str().to_string(),
            schema_version: Some(self.schema_version.clone()),
            snap_token: snap_token.cloned(),
        };
        self.checker.check(params, None).await
    }
}

fn expect_kind(
    operation: &'static str,
    entity: &EntityRef,
    accepted: impl Fn(EntityKind) -> bool,
    expected: &str,
) -> Result<()> {
    match entity.kind() {
        Some(kind) if accepted(kind) => {}
        _ => {
            return Err(AuthzError::validation(
                operation,
                format!("'{}' is not {}", entity, expected),
            ))
        }
    }
    if entity.id.trim().is_empty() {
        return Err(AuthzError::validation(
            operation,
            format!("{} id is empty", entity.entity_type),
        ));
    }
    Ok(())
}
