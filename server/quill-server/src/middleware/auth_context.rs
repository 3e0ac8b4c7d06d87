//! Authentication context extraction
//!
//! Handlers take [`AuthContext`] as an argument to require a signed-in user.
//! The session token is read from `Authorization: Bearer ...` first, then
//! from the `access_token` cookie.

use crate::error::ApiError;
use crate::server::QuillServer;
use crate::session::ACCESS_TOKEN_COOKIE;
use async_trait::async_trait;
use auth_permify::EntityRef;
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }

    /// The caller as an authorization subject
    pub fn subject(&self) -> EntityRef {
        EntityRef::user(&self.user_id.to_string())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<QuillServer> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &QuillServer) -> Result<Self, Self::Rejection> {
        let token = match bearer_token(&parts.headers) {
            Some(token) => token.to_string(),
            None => CookieJar::from_headers(&parts.headers)
                .get(ACCESS_TOKEN_COOKIE)
                .map(|cookie| cookie.value().to_string())
                .ok_or_else(|| ApiError::authentication("Missing session token"))?,
        };

        let user_id = state.sessions.verify(&token)?;
        Ok(AuthContext { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_subject_is_user_entity() {
        let id = Uuid::new_v4();
        let subject = AuthContext::new(id).subject();
        assert_eq!(subject.entity_type, "user");
        assert_eq!(subject.id, id.to_string());
    }
}
