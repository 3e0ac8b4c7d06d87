use crate::db::DomainRepository;
use crate::error::ApiError;
use crate::middleware::AuthContext;
use crate::models::{AddMemberRequest, CreateDomainRequest, Domain};
use auth_identity::IdentityService;
use auth_permify::{Authorizer, EntityRef, Permission, Role};
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use utoipa::ToSchema;
use tracing::{error, info, warn};
use uuid::Uuid;

/// A role granted on a domain
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Membership {
    pub domain_id: Uuid,
    pub user_id: Uuid,
    #[schema(value_type = String, example = "member")]
    pub role: Role,
}

pub struct DomainService {
    domains: Arc<dyn DomainRepository>,
    identity: Arc<IdentityService>,
    authorizer: Authorizer,
    /// Serializes grant-then-store per domain so the stored snap token is
    /// always the one from the latest grant. Engine tokens are opaque and
    /// cannot be compared.
    grant_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl DomainService {
    pub fn new(domains: Arc<dyn DomainRepository>, identity: Arc<IdentityService>, authorizer: Authorizer) -> Self {
        Self {
            domains,
            identity,
            authorizer,
            grant_locks: DashMap::new(),
        }
    }

    /// Create a domain owned and administered by the caller
    pub async fn create(&self, ctx: &AuthContext, request: CreateDomainRequest) -> Result<Domain, ApiError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ApiError::validation("name must not be empty"));
        }

        let now = Utc::now();
        let domain = Domain {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id: ctx.user_id,
            snap_token: None,
            created_at: now,
            updated_at: now,
        };
        let mut domain = self.domains.create(&domain).await?;

        let token = match self.authorizer.grant(&ctx.subject(), &domain.entity(), Role::Admin).await {
            Ok(token) => token,
            Err(err) => {
                warn!(domain_id = %domain.id, error = %err, "Admin grant failed, removing domain");
                if let Err(cleanup) = self.domains.delete(domain.id).await {
                    error!(domain_id = %domain.id, error = %cleanup, "Failed to remove unreachable domain");
                }
                return Err(err.into());
            }
        };
        self.domains.set_snap_token(domain.id, token.as_str()).await?;
        domain.snap_token = Some(token.as_str().to_string());

        info!(domain_id = %domain.id, owner_id = %ctx.user_id, "Domain created");
        Ok(domain)
    }

    /// Grant `member` or `admin` to another user. Needs `edit` on the domain.
    pub async fn add_member(
        &self,
        ctx: &AuthContext,
        domain_id: Uuid,
        request: AddMemberRequest,
    ) -> Result<Membership, ApiError> {
        let domain = self.find(domain_id).await?;
        if !self.allowed(ctx, &domain, Permission::Edit).await? {
            return Err(ApiError::authorization(format!(
                "edit permission required on domain {}",
                domain.id
            )));
        }

        let member = self.identity.find_user(request.user_id).await?;
        let lock = self.grant_locks.entry(domain.id).or_default().clone();
        let stored = {
            let _guard = lock.lock().await;
            self.grant_and_store(&domain, &member.id, request.role).await
        };
        drop(lock);
        self.grant_locks.remove_if(&domain.id, |_, lock| Arc::strong_count(lock) == 1);
        stored?;

        info!(domain_id = %domain.id, user_id = %member.id, role = %request.role, "Domain member added");
        Ok(Membership {
            domain_id: domain.id,
            user_id: member.id,
            role: request.role,
        })
    }

    /// Whether the caller holds `permission` (`view` or `edit`) on the domain
    pub async fn check_permission(&self, ctx: &AuthContext, domain_id: Uuid, permission: &str) -> Result<bool, ApiError> {
        let permission = Permission::parse(permission)
            .ok_or_else(|| ApiError::validation(format!("unknown permission '{}'", permission)))?;
        let domain = self.find(domain_id).await?;
        self.allowed(ctx, &domain, permission).await
    }

    async fn grant_and_store(&self, domain: &Domain, user_id: &Uuid, role: Role) -> Result<(), ApiError> {
        let token = self
            .authorizer
            .grant(&EntityRef::user(&user_id.to_string()), &domain.entity(), role)
            .await?;
        self.domains.set_snap_token(domain.id, token.as_str()).await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Domain, ApiError> {
        self.domains
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("domain"))
    }

    async fn allowed(&self, ctx: &AuthContext, domain: &Domain, permission: Permission) -> Result<bool, ApiError> {
        let token = domain.snap_token();
        Ok(self
            .authorizer
            .authorize(&ctx.subject(), &domain.entity(), permission, token.as_ref())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDomainRepository;
    use auth_identity::{IdentityConfig, InMemoryUserRepository, RegisterRequest};
    use auth_permify::{AuthzConfig, InMemoryEngine};
    use futures::future::join_all;

    async fn register(identity: &IdentityService, email: &str) -> Uuid {
        identity
            .register(RegisterRequest {
                email: email.to_string(),
                name: "Member".to_string(),
                password: "correct-horse-battery".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_concurrent_members_all_see_domain() {
        // Token-less checks see nothing until settled, so every member
        // depends on the token stored with the domain
        let engine = Arc::new(InMemoryEngine::with_lagging_reads());
        let authorizer = Authorizer::provision(engine, &AuthzConfig::default()).await.unwrap();
        let identity = Arc::new(IdentityService::new(
            Arc::new(InMemoryUserRepository::new()),
            IdentityConfig::default(),
        ));
        let service = DomainService::new(Arc::new(InMemoryDomainRepository::new()), identity.clone(), authorizer);

        let owner = AuthContext::new(register(&identity, "owner@example.com").await);
        let domain = service
            .create(&owner, CreateDomainRequest { name: "Research".to_string() })
            .await
            .unwrap();

        let mut members = Vec::new();
        for n in 0..4 {
            members.push(register(&identity, &format!("member{}@example.com", n)).await);
        }
        let grants = members.iter().map(|user_id| {
            service.add_member(
                &owner,
                domain.id,
                AddMemberRequest {
                    user_id: *user_id,
                    role: Role::Member,
                },
            )
        });
        for result in join_all(grants).await {
            result.unwrap();
        }

        for user_id in members {
            let allowed = service
                .check_permission(&AuthContext::new(user_id), domain.id, "view")
                .await
                .unwrap();
            assert!(allowed, "member {} cannot view the domain", user_id);
        }
        assert!(service.grant_locks.is_empty());
    }
}
