use crate::{config::*, error::*, models::*, repository::*};
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct IdentityService {
    user_repo: Arc<dyn UserRepository>,
    config: IdentityConfig,
    argon2: Argon2<'static>,
}

impl IdentityService {
    pub fn new(user_repo: Arc<dyn UserRepository>, config: IdentityConfig) -> Self {
        Self {
            user_repo,
            config,
            argon2: Argon2::default(),
        }
    }

    /// Create a password user
    pub async fn register(&self, request: RegisterRequest) -> Result<User> {
        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(IdentityError::InvalidEmail);
        }

        self.validate_password(&request.password)?;

        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(IdentityError::EmailAlreadyInUse);
        }

        let password_hash = self.hash_password(&request.password)?;
        let name = match request.name.trim() {
            "" => email.clone(),
            name => name.to_string(),
        };

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            name,
            password_hash: Some(password_hash),
            oidc_subject: None,
            created_at: now,
            updated_at: now,
        };

        let user = self.user_repo.create_user(&user).await?;
        info!(user_id = %user.id, "Registered user");
        Ok(user)
    }

    /// Verify an email/password pair. Unknown emails and OIDC-only
    /// accounts fail the same way as a wrong password.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .user_repo
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        let hash = user.password_hash.as_deref().ok_or(IdentityError::InvalidCredentials)?;
        self.verify_password(password, hash)?;

        debug!(user_id = %user.id, "Password login succeeded");
        Ok(user)
    }

    /// Resolve the local user for an OIDC login: by subject first, then by
    /// email (linking the subject to that account), else a new account.
    /// Linking by email needs `email_verified: true` from the provider.
    pub async fn get_or_create_from_oidc(&self, claims: &OidcClaims) -> Result<User> {
        if claims.sub.trim().is_empty() {
            return Err(IdentityError::IncompleteClaims("missing subject".to_string()));
        }

        if let Some(user) = self.user_repo.find_by_oidc_subject(&claims.sub).await? {
            return Ok(user);
        }

        let email = claims
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| is_valid_email(e))
            .ok_or_else(|| IdentityError::IncompleteClaims("missing or invalid email".to_string()))?;

        if let Some(mut user) = self.user_repo.find_by_email(&email).await? {
            if !claims.email_is_verified() {
                warn!(user_id = %user.id, "Refusing to link OIDC subject through an unverified email");
                return Err(IdentityError::UnverifiedEmail);
            }
            user.oidc_subject = Some(claims.sub.clone());
            user.updated_at = Utc::now();
            let user = self.user_repo.update_user(&user).await?;
            info!(user_id = %user.id, "Linked OIDC subject to existing user");
            return Ok(user);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: claims.display_name().map(str::to_string).unwrap_or_else(|| email.clone()),
            email,
            password_hash: None,
            oidc_subject: Some(claims.sub.clone()),
            created_at: now,
            updated_at: now,
        };
        let user = self.user_repo.create_user(&user).await?;
        info!(user_id = %user.id, "Created user from OIDC login");
        Ok(user)
    }

    pub async fn find_user(&self, id: Uuid) -> Result<User> {
        self.user_repo.find_by_id(id).await?.ok_or(IdentityError::UserNotFound)
    }

    fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| IdentityError::HashingError)?
            .to_string();
        Ok(password_hash)
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<()> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| IdentityError::HashingError)?;

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| IdentityError::InvalidCredentials)
    }

    fn validate_password(&self, password: &str) -> Result<()> {
        let length = password.chars().count();
        if length < self.config.password_min_length {
            return Err(IdentityError::WeakPassword(format!(
                "must be at least {} characters",
                self.config.password_min_length
            )));
        }
        if length > self.config.password_max_length {
            return Err(IdentityError::WeakPassword(format!(
                "must be at most {} characters",
                self.config.password_max_length
            )));
        }
        if self.config.password_require_numbers && !password.chars().any(|c| c.is_numeric()) {
            return Err(IdentityError::WeakPassword("must contain a number".to_string()));
        }
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@localhost"));
        assert!(!is_valid_email("ada@example."));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
