use crate::{
    engine::{with_deadline, PermissionEngine, OP_DATA_WRITE},
    error::{AuthzError, OperationContext, Result},
    models::*,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Writes relation tuples, one per call.
///
/// Relation names are not checked here; the engine rejects the ones its
/// schema does not declare.
#[derive(Clone)]
pub struct RelationshipWriter {
    engine: Arc<dyn PermissionEngine>,
    schema_version: Option<SchemaVersion>,
}

impl RelationshipWriter {
    pub fn new(engine: Arc<dyn PermissionEngine>) -> Self {
        Self {
            engine,
            schema_version: None,
        }
    }

    /// Pin writes to a schema version instead of the engine's latest
    pub fn with_schema_version(mut self, version: SchemaVersion) -> Self {
        self.schema_version = Some(version);
        self
    }

    /// Record that `subject_type:subject_id` has `relation` on
    /// `entity_type:entity_id` and return the write's snap token.
    #[allow(clippy::too_many_arguments)]
    pub async fn write_relationship(
        &self,
        tenant: &str,
        entity_type: &str,
        entity_id: &str,
        relation: &str,
        subject_type: &str,
        subject_id: &str,
        deadline: Option<Duration>,
    ) -> Result<SnapToken> {
        let tuple = RelationTuple::new(
            EntityRef::new(entity_type, entity_id),
            relation,
            SubjectRef::new(subject_type, subject_id),
        );
        self.write_tuple(tenant, tuple, deadline).await
    }

    /// Like [`RelationshipWriter::write_relationship`], for tuples whose
    /// subject is a userset.
    pub async fn write_tuple(&self, tenant: &str, tuple: RelationTuple, deadline: Option<Duration>) -> Result<SnapToken> {
        validate_tuple(&tuple)?;

        let tenant = TenantId::new(tenant);
        let context = OperationContext::new(OP_DATA_WRITE, tenant.as_str()).with_entity(&tuple.entity);
        debug!(tenant = %tenant, tuple = %tuple, "Writing relationship");

        let request = RelationshipWriteRequest {
            schema_version: self.schema_version.clone(),
            tuples: vec![tuple],
        };
        with_deadline(context, deadline, self.engine.write_relationships(&tenant, request)).await
    }
}

fn validate_tuple(tuple: &RelationTuple) -> Result<()> {
    let fields = [
        ("entity type", tuple.entity.entity_type.as_str()),
        ("entity id", tuple.entity.id.as_str()),
        ("relation", tuple.relation.as_str()),
        ("subject type", tuple.subject.subject_type.as_str()),
        ("subject id", tuple.subject.id.as_str()),
        ("subject relation", tuple.subject.relation.as_deref().unwrap_or("-")),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(AuthzError::validation(OP_DATA_WRITE, format!("{} is empty", name)));
        }
    }
    Ok(())
}
