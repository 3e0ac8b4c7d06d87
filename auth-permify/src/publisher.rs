use crate::{
    engine::{with_deadline, PermissionEngine, OP_SCHEMA_WRITE},
    error::{AuthzError, OperationContext, Result},
    models::{SchemaVersion, TenantId},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Uploads authorization models to the engine
#[derive(Clone)]
pub struct SchemaPublisher {
    engine: Arc<dyn PermissionEngine>,
}

impl SchemaPublisher {
    pub fn new(engine: Arc<dyn PermissionEngine>) -> Self {
        Self { engine }
    }

    /// Publish `schema_text` for `tenant` and return the new version.
    ///
    /// An empty tenant resolves to the default tenant. Republishing the same
    /// text is safe; the engine hands back a usable version each time.
    pub async fn publish(&self, tenant: &str, schema_text: &str, deadline: Option<Duration>) -> Result<SchemaVersion> {
        if schema_text.trim().is_empty() {
            return Err(AuthzError::validation(OP_SCHEMA_WRITE, "schema text is empty"));
        }

        let tenant = TenantId::new(tenant);
        let context = OperationContext::new(OP_SCHEMA_WRITE, tenant.as_str());
        let version = with_deadline(context, deadline, self.engine.write_schema(&tenant, schema_text)).await?;

        info!(tenant = %tenant, schema_version = %version, "Published authorization schema");
        Ok(version)
    }
}
