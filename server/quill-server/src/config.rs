//! Server configuration
//!
//! Values are layered: serde defaults, then the optional config file, then
//! `QUILL__*` environment variables (`QUILL__AUTHZ__ENDPOINT`,
//! `QUILL__DATABASE__BACKEND`, ...). A `.env` file is loaded first when
//! present.

use auth_identity::IdentityConfig;
use auth_oauth::OidcConfig;
use auth_permify::AuthzConfig;
use logger_redacted::LogConfig;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

pub const ENV_PREFIX: &str = "QUILL";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub oidc: OidcSettings,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub authz: AuthzConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub posts: PostsConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    /// Process-local maps; state is lost on restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_backend")]
    pub backend: DatabaseBackend,
    #[serde(default = "default_database_host")]
    pub host: String,
    #[serde(default = "default_database_port")]
    pub port: u16,
    #[serde(default = "default_database_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_database_name")]
    pub name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_backend() -> DatabaseBackend {
    DatabaseBackend::Postgres
}

fn default_database_host() -> String {
    "localhost".to_string()
}

fn default_database_port() -> u16 {
    5432
}

fn default_database_user() -> String {
    "quill".to_string()
}

fn default_database_name() -> String {
    "quill".to_string()
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_database_backend(),
            host: default_database_host(),
            port: default_database_port(),
            user: default_database_user(),
            password: String::new(),
            name: default_database_name(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// Connection options built field by field, so credentials need no escaping
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

/// OpenID login settings. Disabled unless `enabled` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_url: String,
    /// Where the browser lands after a successful callback
    #[serde(default = "default_success_redirect")]
    pub success_redirect: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_success_redirect() -> String {
    "/".to_string()
}

impl Default for OidcSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: String::new(),
            client_id: String::new(),
            client_secret: None,
            redirect_url: String::new(),
            success_redirect: default_success_redirect(),
            scopes: Vec::new(),
        }
    }
}

impl OidcSettings {
    pub fn provider_config(&self) -> Result<OidcConfig, ConfigError> {
        if self.issuer.is_empty() || self.client_id.is_empty() || self.redirect_url.is_empty() {
            return Err(ConfigError::Invalid(
                "oidc.issuer, oidc.client_id and oidc.redirect_url are required when oidc is enabled".to_string(),
            ));
        }
        let scopes = if self.scopes.is_empty() {
            vec!["openid".to_string(), "email".to_string(), "profile".to_string()]
        } else {
            self.scopes.clone()
        };
        Ok(OidcConfig {
            issuer: self.issuer.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_url: self.redirect_url.clone(),
            scopes,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HS256 signing key, at least 32 bytes
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    /// Mark cookies `Secure`; turn off only for plain-HTTP development
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_ttl_hours() -> i64 {
    24
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl_hours: default_ttl_hours(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostsConfig {
    /// Permission checks in flight at once while listing posts
    #[serde(default = "default_list_check_concurrency")]
    pub list_check_concurrency: usize,
}

fn default_list_check_concurrency() -> usize {
    16
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self {
            list_check_concurrency: default_list_check_concurrency(),
        }
    }
}

impl AppConfig {
    /// Load `.env`, the optional file at `path`, then `QUILL__*` variables.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        // A missing .env is normal outside development
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("oidc.scopes"),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.secret.len() < 32 {
            return Err(ConfigError::Invalid(
                "session.secret must be at least 32 bytes (QUILL__SESSION__SECRET)".to_string(),
            ));
        }
        if self.session.ttl_hours <= 0 {
            return Err(ConfigError::Invalid("session.ttl_hours must be positive".to_string()));
        }
        if self.posts.list_check_concurrency == 0 {
            return Err(ConfigError::Invalid("posts.list_check_concurrency must be positive".to_string()));
        }
        if self.oidc.enabled {
            self.oidc.provider_config()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.database.backend, DatabaseBackend::Postgres);
        assert_eq!(config.http.port, 8080);
        assert!(!config.oidc.enabled);
        assert_eq!(config.oidc.success_redirect, "/");
        assert_eq!(config.session.ttl_hours, 24);
        assert_eq!(config.authz.tenant_id, "t1");
        assert_eq!(config.posts.list_check_concurrency, 16);
    }

    #[test]
    fn test_default_config_redirects_home() {
        let config = AppConfig::default();
        assert_eq!(config.oidc.success_redirect, "/");
        assert!(config.oidc.scopes.is_empty());
    }

    #[test]
    fn test_connect_options_keep_fields_apart() {
        let database = DatabaseConfig {
            host: "db.internal".to_string(),
            port: 6543,
            password: "p@ss/w:rd".to_string(),
            ..Default::default()
        };
        let options = database.connect_options();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "quill");
        assert_eq!(options.get_database(), Some("quill"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = AppConfig::default();
        config.session.secret = "short".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.session.secret = "x".repeat(32);
        assert!(config.validate().is_ok());

        config.posts.list_check_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enabled_oidc_requires_issuer() {
        let mut config = AppConfig::default();
        config.session.secret = "x".repeat(32);
        config.oidc.enabled = true;
        assert!(config.validate().is_err());

        config.oidc.issuer = "https://idp.example.com".to_string();
        config.oidc.client_id = "quill".to_string();
        config.oidc.redirect_url = "http://localhost:8080/auth/oidc/callback".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.oidc.provider_config().unwrap().scopes.len(), 3);
    }
}
