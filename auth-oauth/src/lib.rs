//! OpenID Connect login for Quill
//!
//! This module provides the relying-party side of the authorization code flow:
//! - Discovery of provider endpoints from the issuer
//! - Authorization URLs with CSRF state and PKCE
//! - Code exchange and userinfo claims
//!
//! # Example
//!
//! ```rust,no_run
//! use auth_oauth::{OidcConfig, OidcProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OidcConfig {
//!         issuer: "https://accounts.example.com".to_string(),
//!         client_id: "quill".to_string(),
//!         client_secret: Some("secret".to_string()),
//!         redirect_url: "http://localhost:8080/auth/oidc/callback".to_string(),
//!         scopes: vec!["openid".to_string(), "email".to_string()],
//!     };
//!     let provider = OidcProvider::discover(&config, reqwest::Client::new()).await?;
//!
//!     let login = provider.authorization_url();
//!     println!("redirect to {}", login.url);
//!
//!     // ...after the browser comes back with ?code=...&state=...
//!     let tokens = provider.exchange_code("code", &login.state).await?;
//!     let claims = provider.fetch_claims(&tokens.access_token).await?;
//!     println!("logged in as {}", claims.sub);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod models;
pub mod provider;

pub use error::*;
pub use models::*;
pub use provider::*;
