use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Account owning posts and domains.
///
/// Password users carry a hash; users created through OIDC carry the
/// provider's subject instead. A user can hold both once linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub oidc_subject: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Claims read from the identity provider's userinfo endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    /// Some providers send `"true"` as a string
    #[serde(default, deserialize_with = "flexible_bool")]
    pub email_verified: Option<bool>,
}

fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(value)) => Some(value),
        Some(Flag::Text(text)) => text.parse().ok(),
        None => None,
    })
}

impl OidcClaims {
    /// Best display name the provider offered
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .filter(|n| !n.trim().is_empty())
    }

    /// The provider vouches for the email address
    pub fn email_is_verified(&self) -> bool {
        self.email_verified == Some(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            password_hash: Some("$argon2id$...".to_string()),
            oidc_subject: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "ada@example.com");
    }

    #[test]
    fn test_display_name_fallback() {
        let claims: OidcClaims = serde_json::from_str(r#"{"sub":"abc","preferred_username":"ada"}"#).unwrap();
        assert_eq!(claims.display_name(), Some("ada"));

        let bare: OidcClaims = serde_json::from_str(r#"{"sub":"abc"}"#).unwrap();
        assert_eq!(bare.display_name(), None);
    }

    #[test]
    fn test_email_verified_forms() {
        let verified: OidcClaims = serde_json::from_str(r#"{"sub":"a","email_verified":true}"#).unwrap();
        assert!(verified.email_is_verified());

        let as_text: OidcClaims = serde_json::from_str(r#"{"sub":"a","email_verified":"true"}"#).unwrap();
        assert!(as_text.email_is_verified());

        let denied: OidcClaims = serde_json::from_str(r#"{"sub":"a","email_verified":false}"#).unwrap();
        assert!(!denied.email_is_verified());

        let absent: OidcClaims = serde_json::from_str(r#"{"sub":"a"}"#).unwrap();
        assert_eq!(absent.email_verified, None);
        assert!(!absent.email_is_verified());
    }
}
