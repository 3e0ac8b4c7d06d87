use crate::{
    engine::{with_deadline, PermissionEngine, OP_PERMISSION_CHECK},
    error::{AuthzError, OperationContext, Result},
    models::*,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Recursion bound sent with every check
pub const DEFAULT_DEPTH: u32 = 50;

/// Inputs of a single permission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckParams {
    pub tenant: TenantId,
    pub subject: EntityRef,
    pub resource: EntityRef,
    pub permission: String,
    /// `None` evaluates against the engine's latest schema
    pub schema_version: Option<SchemaVersion>,
    /// Forwarded unchanged; `None` lets the engine pick a snapshot
    pub snap_token: Option<SnapToken>,
}

/// Answers "can subject S perform P on R?"
#[derive(Clone)]
pub struct PermissionChecker {
    engine: Arc<dyn PermissionEngine>,
    depth: u32,
    default_deadline: Option<Duration>,
}

impl PermissionChecker {
    pub fn new(engine: Arc<dyn PermissionEngine>) -> Self {
        Self {
            engine,
            depth: DEFAULT_DEPTH,
            default_deadline: None,
        }
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Deadline used when a call passes none
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = Some(deadline);
        self
    }

    /// Only an explicit allow from the engine yields `Ok(true)`.
    pub async fn check(&self, params: CheckParams, deadline: Option<Duration>) -> Result<bool> {
        validate(&params)?;

        if params.schema_version.is_none() {
            warn!(
                tenant = %params.tenant,
                resource = %params.resource,
                "Permission check without schema version, engine will use its latest schema"
            );
        }

        let context = OperationContext::new(OP_PERMISSION_CHECK, params.tenant.as_str()).with_entity(&params.resource);
        let request = CheckRequest {
            entity: params.resource,
            permission: params.permission,
            subject: SubjectRef::from(&params.subject),
            schema_version: params.schema_version,
            snap_token: params.snap_token,
            depth: self.depth,
        };

        let result = with_deadline(
            context,
            deadline.or(self.default_deadline),
            self.engine.check(&params.tenant, request),
        )
        .await?;

        debug!(tenant = %params.tenant, subject = %params.subject, result = ?result, "Permission checked");
        Ok(result.is_allowed())
    }
}

fn validate(params: &CheckParams) -> Result<()> {
    let fields = [
        ("subject type", params.subject.entity_type.as_str()),
        ("subject id", params.subject.id.as_str()),
        ("resource type", params.resource.entity_type.as_str()),
        ("resource id", params.resource.id.as_str()),
        ("permission", params.permission.as_str()),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(AuthzError::validation(OP_PERMISSION_CHECK, format!("{} is empty", name)));
        }
    }
    Ok(())
}
