use crate::{
    error::{AuthzError, OperationContext, Result},
    models::*,
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub const OP_SCHEMA_WRITE: &str = "schema.write";
pub const OP_DATA_WRITE: &str = "data.write";
pub const OP_PERMISSION_CHECK: &str = "permission.check";

/// Bound applied to every remote call when the caller gives none.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Contract an authorization engine fulfils for this crate.
///
/// Implementations own their error context: every `Err` they return is
/// already tagged with the operation and tenant it came from.
#[async_trait]
pub trait PermissionEngine: Send + Sync {
    /// Store a new schema snapshot and return its version
    async fn write_schema(&self, tenant: &TenantId, schema: &str) -> Result<SchemaVersion>;

    /// Append tuples and return the snap token of the write
    async fn write_relationships(&self, tenant: &TenantId, request: RelationshipWriteRequest) -> Result<SnapToken>;

    /// Evaluate a permission for a subject on an entity
    async fn check(&self, tenant: &TenantId, request: CheckRequest) -> Result<CheckResult>;
}

/// Run `call` under `deadline` (or [`DEFAULT_DEADLINE`]). On expiry the
/// call's future is dropped, which aborts any in-flight request.
pub async fn with_deadline<T, F>(context: OperationContext, deadline: Option<Duration>, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let after = deadline.unwrap_or(DEFAULT_DEADLINE);
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(AuthzError::Timeout { context, after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let context = OperationContext::new(OP_PERMISSION_CHECK, "t1");
        let result: Result<()> = with_deadline(context, Some(Duration::from_millis(50)), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        match result {
            Err(AuthzError::Timeout { after, .. }) => assert_eq!(after, Duration::from_millis(50)),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deadline_passes_result_through() {
        let context = OperationContext::new(OP_SCHEMA_WRITE, "t1");
        let version = with_deadline(context, None, async { Ok(SchemaVersion::new("v1")) })
            .await
            .unwrap();
        assert_eq!(version.as_str(), "v1");
    }
}
