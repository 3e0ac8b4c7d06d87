//! OpenID Connect authorization-code flow
//!
//! Implements the relying-party side of SSO:
//! - Provider discovery from the issuer's well-known document
//! - Authorization URL with CSRF state and PKCE challenge
//! - Code exchange with the PKCE verifier kept for that state
//! - Userinfo claims for account provisioning

use crate::{error::*, models::*};
use auth_identity::OidcClaims;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// How long a started login may take before its state is rejected
const STATE_TTL_MINUTES: i64 = 10;

struct PendingLogin {
    verifier: String,
    created_at: DateTime<Utc>,
}

pub struct OidcProvider {
    metadata: ProviderMetadata,
    scopes: Vec<String>,
    oauth_client: BasicClient,
    http_client: reqwest::Client,
    pending: Arc<DashMap<String, PendingLogin>>,
}

impl OidcProvider {
    /// Fetch the issuer's discovery document and build the client
    pub async fn discover(config: &OidcConfig, http_client: reqwest::Client) -> Result<Self> {
        let issuer = Url::parse(config.issuer.trim_end_matches('/'))
            .map_err(|e| OAuthError::InvalidConfig(format!("issuer: {}", e)))?;
        let discovery_url = format!("{}/.well-known/openid-configuration", issuer.as_str().trim_end_matches('/'));

        debug!(url = %discovery_url, "Fetching OIDC discovery document");
        let response = http_client.get(&discovery_url).send().await?;
        if !response.status().is_success() {
            return Err(OAuthError::Discovery(format!(
                "{} returned {}",
                discovery_url,
                response.status()
            )));
        }
        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| OAuthError::Discovery(format!("malformed discovery document: {}", e)))?;

        info!(issuer = %metadata.issuer, "Discovered OIDC provider");
        Self::from_metadata(config, metadata, http_client)
    }

    /// Build the client from already-known endpoints
    pub fn from_metadata(config: &OidcConfig, metadata: ProviderMetadata, http_client: reqwest::Client) -> Result<Self> {
        let auth_url = AuthUrl::new(metadata.authorization_endpoint.clone())
            .map_err(|e| OAuthError::InvalidConfig(format!("authorization endpoint: {}", e)))?;
        let token_url = TokenUrl::new(metadata.token_endpoint.clone())
            .map_err(|e| OAuthError::InvalidConfig(format!("token endpoint: {}", e)))?;
        let redirect_url = RedirectUrl::new(config.redirect_url.clone())
            .map_err(|e| OAuthError::InvalidConfig(format!("redirect url: {}", e)))?;

        let oauth_client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            config.client_secret.clone().map(ClientSecret::new),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect_url);

        Ok(Self {
            metadata,
            scopes: config.scopes.clone(),
            oauth_client,
            http_client,
            pending: Arc::new(DashMap::new()),
        })
    }

    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// Start a login. The returned state must come back on the callback.
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .oauth_client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge)
            .add_scopes(self.scopes.iter().map(|s| Scope::new(s.clone())))
            .url();

        self.cleanup_expired_states();
        let state = csrf_state.secret().clone();
        self.pending.insert(
            state.clone(),
            PendingLogin {
                verifier: pkce_verifier.secret().clone(),
                created_at: Utc::now(),
            },
        );

        AuthorizationRequest {
            url: auth_url.to_string(),
            state,
        }
    }

    /// Redeem an authorization code. Each state is usable once.
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<OidcTokens> {
        let (_, pending) = self.pending.remove(state).ok_or(OAuthError::InvalidState)?;
        if Utc::now() - pending.created_at > Duration::minutes(STATE_TTL_MINUTES) {
            return Err(OAuthError::InvalidState);
        }

        let token = self
            .oauth_client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pending.verifier))
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                warn!(error = %e, "Authorization code exchange failed");
                OAuthError::TokenExchange(e.to_string())
            })?;

        Ok(OidcTokens {
            access_token: token.access_token().secret().clone(),
            refresh_token: token.refresh_token().map(|t| t.secret().clone()),
            expires_in: token.expires_in().map(|d| d.as_secs()),
        })
    }

    /// Read the user's claims from the userinfo endpoint
    pub async fn fetch_claims(&self, access_token: &str) -> Result<OidcClaims> {
        let userinfo_url = self
            .metadata
            .userinfo_endpoint
            .as_ref()
            .ok_or_else(|| OAuthError::UserInfo("provider has no userinfo endpoint".to_string()))?;

        let response = self.http_client.get(userinfo_url).bearer_auth(access_token).send().await?;
        if !response.status().is_success() {
            return Err(OAuthError::UserInfo(format!(
                "userinfo endpoint returned {}",
                response.status()
            )));
        }

        let claims: OidcClaims = response
            .json()
            .await
            .map_err(|e| OAuthError::UserInfo(format!("malformed userinfo response: {}", e)))?;
        Ok(claims)
    }

    fn cleanup_expired_states(&self) {
        let cutoff = Utc::now() - Duration::minutes(STATE_TTL_MINUTES);
        self.pending.retain(|_, login| login.created_at > cutoff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OidcProvider {
        let config = OidcConfig {
            issuer: "https://id.example.com".to_string(),
            client_id: "quill".to_string(),
            client_secret: Some("s3cret".to_string()),
            redirect_url: "http://localhost:8080/auth/oidc/callback".to_string(),
            scopes: vec!["openid".to_string(), "email".to_string()],
        };
        let metadata = ProviderMetadata {
            issuer: "https://id.example.com".to_string(),
            authorization_endpoint: "https://id.example.com/authorize".to_string(),
            token_endpoint: "https://id.example.com/token".to_string(),
            userinfo_endpoint: None,
        };
        OidcProvider::from_metadata(&config, metadata, reqwest::Client::new()).unwrap()
    }

    #[test]
    fn test_authorization_url_carries_state_and_pkce() {
        let provider = provider();
        let request = provider.authorization_url();

        let url = Url::parse(&request.url).unwrap();
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query.get("state"), Some(&request.state));
        assert_eq!(query.get("client_id").map(String::as_str), Some("quill"));
        assert_eq!(query.get("code_challenge_method").map(String::as_str), Some("S256"));
        assert_eq!(query.get("scope").map(String::as_str), Some("openid email"));
        assert!(provider.pending.contains_key(&request.state));
    }

    #[tokio::test]
    async fn test_unknown_state_rejected() {
        let provider = provider();
        let err = provider.exchange_code("code", "forged").await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidState));
    }

    #[tokio::test]
    async fn test_expired_state_rejected() {
        let provider = provider();
        let request = provider.authorization_url();
        if let Some(mut login) = provider.pending.get_mut(&request.state) {
            login.created_at = Utc::now() - Duration::minutes(STATE_TTL_MINUTES + 1);
        }
        let err = provider.exchange_code("code", &request.state).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidState));
    }

    #[tokio::test]
    async fn test_missing_userinfo_endpoint() {
        let err = provider().fetch_claims("token").await.unwrap_err();
        assert!(matches!(err, OAuthError::UserInfo(_)));
    }
}
