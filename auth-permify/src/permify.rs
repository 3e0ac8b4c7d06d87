//! Permify REST transport.

use crate::{
    engine::{PermissionEngine, OP_DATA_WRITE, OP_PERMISSION_CHECK, OP_SCHEMA_WRITE},
    error::{AuthzError, OperationContext, Result},
    models::*,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize)]
struct SchemaWriteBody<'a> {
    schema: &'a str,
}

#[derive(Deserialize)]
struct SchemaWriteResponse {
    schema_version: SchemaVersion,
}

#[derive(Serialize)]
struct WriteMetadata<'a> {
    schema_version: &'a str,
}

#[derive(Serialize)]
struct DataWriteBody<'a> {
    metadata: WriteMetadata<'a>,
    tuples: &'a [RelationTuple],
    attributes: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct DataWriteResponse {
    snap_token: SnapToken,
}

#[derive(Serialize)]
struct CheckMetadata<'a> {
    schema_version: &'a str,
    snap_token: &'a str,
    depth: u32,
}

#[derive(Serialize)]
struct CheckBody<'a> {
    metadata: CheckMetadata<'a>,
    entity: &'a EntityRef,
    permission: &'a str,
    subject: &'a SubjectRef,
}

#[derive(Deserialize)]
struct CheckResponse {
    #[serde(default)]
    can: CheckResult,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// [`PermissionEngine`] backed by a Permify server.
///
/// Cloning shares the underlying connection pool.
#[derive(Clone)]
pub struct PermifyClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl PermifyClient {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self::with_http_client(reqwest::Client::new(), endpoint, api_key)
    }

    /// Reuse an existing client (and its pool) for engine calls
    pub fn with_http_client(http: reqwest::Client, endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<B, R>(&self, context: &OperationContext, tenant: &TenantId, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/v1/tenants/{}/{}", self.endpoint, tenant, path);
        debug!(url = %url, operation = context.operation, "Calling Permify");

        let mut request = self.http.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request timed out: {}", e)
            } else {
                e.to_string()
            };
            AuthzError::transport(context.clone(), message)
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<R>()
                .await
                .map_err(|e| AuthzError::transport(context.clone(), format!("malformed response body: {}", e)));
        }

        let text = response.text().await.unwrap_or_default();
        Err(status_error(context.clone(), status, &text))
    }
}

/// Gateway statuses mean the engine was never reached; anything else
/// non-2xx is the engine's own answer.
fn status_error(context: OperationContext, status: StatusCode, body: &str) -> AuthzError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let message = match parsed {
        Some(ref b) if !b.message.is_empty() => b.message.clone(),
        _ if body.is_empty() => status.to_string(),
        _ => body.to_string(),
    };

    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            warn!(status = %status, operation = context.operation, "Permify unavailable");
            AuthzError::transport(context, format!("{}: {}", status, message))
        }
        _ => {
            let code = parsed
                .map(|b| b.code)
                .filter(|c| *c != 0)
                .unwrap_or_else(|| i32::from(status.as_u16()));
            AuthzError::engine(context, code, message)
        }
    }
}

#[async_trait]
impl PermissionEngine for PermifyClient {
    async fn write_schema(&self, tenant: &TenantId, schema: &str) -> Result<SchemaVersion> {
        let context = OperationContext::new(OP_SCHEMA_WRITE, tenant.as_str());
        let response: SchemaWriteResponse = self
            .post(&context, tenant, "schemas/write", &SchemaWriteBody { schema })
            .await?;
        Ok(response.schema_version)
    }

    async fn write_relationships(&self, tenant: &TenantId, request: RelationshipWriteRequest) -> Result<SnapToken> {
        let mut context = OperationContext::new(OP_DATA_WRITE, tenant.as_str());
        if let Some(first) = request.tuples.first() {
            context = context.with_entity(&first.entity);
        }

        let body = DataWriteBody {
            metadata: WriteMetadata {
                // empty selects the latest schema
                schema_version: request.schema_version.as_ref().map(SchemaVersion::as_str).unwrap_or(""),
            },
            tuples: &request.tuples,
            attributes: Vec::new(),
        };
        let response: DataWriteResponse = self.post(&context, tenant, "data/write", &body).await?;
        Ok(response.snap_token)
    }

    async fn check(&self, tenant: &TenantId, request: CheckRequest) -> Result<CheckResult> {
        let context = OperationContext::new(OP_PERMISSION_CHECK, tenant.as_str()).with_entity(&request.entity);

        let body = CheckBody {
            metadata: CheckMetadata {
                schema_version: request.schema_version.as_ref().map(SchemaVersion::as_str).unwrap_or(""),
                snap_token: request.snap_token.as_ref().map(SnapToken::as_str).unwrap_or(""),
                depth: request.depth,
            },
            entity: &request.entity,
            permission: &request.permission,
            subject: &request.subject,
        };
        let response: CheckResponse = self.post(&context, tenant, "permissions/check", &body).await?;
        Ok(response.can)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_statuses_are_transport() {
        let context = OperationContext::new(OP_PERMISSION_CHECK, "t1");
        for status in [StatusCode::BAD_GATEWAY, StatusCode::SERVICE_UNAVAILABLE, StatusCode::GATEWAY_TIMEOUT] {
            let err = status_error(context.clone(), status, "");
            assert!(matches!(err, AuthzError::Transport { .. }), "{}", status);
        }
    }

    #[test]
    fn test_error_body_code_is_kept() {
        let context = OperationContext::new(OP_DATA_WRITE, "t1");
        let err = status_error(
            context,
            StatusCode::BAD_REQUEST,
            r#"{"code":3,"message":"ERROR_CODE_RELATION_DEFINITION_NOT_FOUND"}"#,
        );
        match err {
            AuthzError::Engine { code, message, .. } => {
                assert_eq!(code, 3);
                assert_eq!(message, "ERROR_CODE_RELATION_DEFINITION_NOT_FOUND");
            }
            other => panic!("expected engine error, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_text_error_uses_status_code() {
        let context = OperationContext::new(OP_SCHEMA_WRITE, "t1");
        match status_error(context, StatusCode::NOT_FOUND, "no such route") {
            AuthzError::Engine { code, message, .. } => {
                assert_eq!(code, 404);
                assert_eq!(message, "no such route");
            }
            other => panic!("expected engine error, got {:?}", other),
        }
    }

    #[test]
    fn test_check_body_shape() {
        let entity = EntityRef::post("p1");
        let subject = SubjectRef::new("user", "u1");
        let body = CheckBody {
            metadata: CheckMetadata {
                schema_version: "v1",
                snap_token: "",
                depth: 50,
            },
            entity: &entity,
            permission: "edit",
            subject: &subject,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "metadata": {"schema_version": "v1", "snap_token": "", "depth": 50},
                "entity": {"type": "post", "id": "p1"},
                "permission": "edit",
                "subject": {"type": "user", "id": "u1"}
            })
        );
    }
}
