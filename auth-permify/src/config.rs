use crate::{checker::DEFAULT_DEPTH, models::DEFAULT_TENANT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which engine the server talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthzBackend {
    Permify,
    /// In-process engine, for development without a Permify server
    Memory,
}

/// Authorization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthzConfig {
    #[serde(default = "default_backend")]
    pub backend: AuthzBackend,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Pre-shared key sent as a bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_tenant")]
    pub tenant_id: String,

    #[serde(default = "default_depth")]
    pub depth: u32,

    #[serde(default = "default_timeout_ms")]
    pub schema_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub check_timeout_ms: u64,

    /// File holding the schema to publish instead of the built-in one
    #[serde(default)]
    pub schema_path: Option<String>,
}

fn default_backend() -> AuthzBackend {
    AuthzBackend::Permify
}

fn default_endpoint() -> String {
    "http://localhost:3476".to_string()
}

fn default_tenant() -> String {
    DEFAULT_TENANT.to_string()
}

fn default_depth() -> u32 {
    DEFAULT_DEPTH
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            endpoint: default_endpoint(),
            api_key: None,
            tenant_id: default_tenant(),
            depth: default_depth(),
            schema_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
            check_timeout_ms: default_timeout_ms(),
            schema_path: None,
        }
    }
}

impl AuthzConfig {
    pub fn schema_timeout(&self) -> Duration {
        Duration::from_millis(self.schema_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: AuthzConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.backend, AuthzBackend::Permify);
        assert_eq!(config.tenant_id, "t1");
        assert_eq!(config.depth, 50);
        assert_eq!(config.check_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_memory_backend() {
        let config: AuthzConfig = serde_json::from_str(r#"{"backend":"memory","check_timeout_ms":250}"#).unwrap();
        assert_eq!(config.backend, AuthzBackend::Memory);
        assert_eq!(config.check_timeout(), Duration::from_millis(250));
    }
}
