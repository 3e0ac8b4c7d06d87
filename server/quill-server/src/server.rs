use crate::config::{AppConfig, DatabaseBackend};
use crate::db::{
    DomainRepository, InMemoryDomainRepository, InMemoryPostRepository, PostRepository, PostgresDomainRepository,
    PostgresPostRepository,
};
use crate::services::{DomainService, PostService};
use crate::session::SessionManager;
use anyhow::{Context, Result};
use auth_identity::{IdentityService, InMemoryUserRepository, PostgresUserRepository, UserRepository};
use auth_oauth::OidcProvider;
use auth_permify::{AuthzBackend, Authorizer, InMemoryEngine, PermifyClient, PermissionEngine};
use logger_redacted::{PiiRedactor, RedactionConfig};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct QuillServer {
    pub config: Arc<AppConfig>,
    pub authorizer: Authorizer,
    pub identity: Arc<IdentityService>,
    pub posts: Arc<PostService>,
    pub domains: Arc<DomainService>,
    pub sessions: SessionManager,
    /// Present when OIDC login is enabled
    pub oidc: Option<Arc<OidcProvider>>,
    pub redactor: PiiRedactor,
}

struct Repositories {
    users: Arc<dyn UserRepository>,
    posts: Arc<dyn PostRepository>,
    domains: Arc<dyn DomainRepository>,
}

impl QuillServer {
    /// Connect storage, provision the authorizer and discover the identity
    /// provider as configured.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let http = reqwest::Client::new();

        let engine: Arc<dyn PermissionEngine> = match config.authz.backend {
            AuthzBackend::Permify => {
                info!(endpoint = %config.authz.endpoint, "Using Permify authorization engine");
                Arc::new(PermifyClient::with_http_client(
                    http.clone(),
                    &config.authz.endpoint,
                    config.authz.api_key.clone(),
                ))
            }
            AuthzBackend::Memory => {
                info!("Using in-memory authorization engine");
                Arc::new(InMemoryEngine::new())
            }
        };
        let authorizer = Authorizer::provision(engine, &config.authz)
            .await
            .context("Failed to provision authorization schema")?;

        let repositories = connect_repositories(&config).await?;

        let oidc = if config.oidc.enabled {
            let provider_config = config.oidc.provider_config()?;
            let provider = OidcProvider::discover(&provider_config, http)
                .await
                .context("Failed to discover OIDC provider")?;
            info!(issuer = %provider_config.issuer, "OIDC login enabled");
            Some(Arc::new(provider))
        } else {
            None
        };

        Ok(Self::from_parts(config, authorizer, repositories.users, repositories.posts, repositories.domains, oidc))
    }

    pub fn from_parts(
        config: AppConfig,
        authorizer: Authorizer,
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        domains: Arc<dyn DomainRepository>,
        oidc: Option<Arc<OidcProvider>>,
    ) -> Self {
        let identity = Arc::new(IdentityService::new(users, config.identity.clone()));
        let redactor = if config.log.redaction_enabled {
            PiiRedactor::default()
        } else {
            PiiRedactor::new(RedactionConfig::disabled())
        };

        Self {
            posts: Arc::new(PostService::new(
                posts,
                domains.clone(),
                authorizer.clone(),
                config.posts.list_check_concurrency,
            )),
            domains: Arc::new(DomainService::new(domains, identity.clone(), authorizer.clone())),
            sessions: SessionManager::new(&config.session),
            config: Arc::new(config),
            authorizer,
            identity,
            oidc,
            redactor,
        }
    }
}

async fn connect_repositories(config: &AppConfig) -> Result<Repositories> {
    match config.database.backend {
        DatabaseBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect_with(config.database.connect_options())
                .await
                .with_context(|| {
                    format!(
                        "Failed to connect to database {}:{}/{}",
                        config.database.host, config.database.port, config.database.name
                    )
                })?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;
            info!(host = %config.database.host, database = %config.database.name, "Database ready");

            Ok(Repositories {
                users: Arc::new(PostgresUserRepository::new(pool.clone())),
                posts: Arc::new(PostgresPostRepository::new(pool.clone())),
                domains: Arc::new(PostgresDomainRepository::new(pool)),
            })
        }
        DatabaseBackend::Memory => {
            info!("Using in-memory storage");
            Ok(Repositories {
                users: Arc::new(InMemoryUserRepository::new()),
                posts: Arc::new(InMemoryPostRepository::new()),
                domains: Arc::new(InMemoryDomainRepository::new()),
            })
        }
    }
}
