//! Password and OpenID login
//!
//! Successful logins return the session token in the body and set it as the
//! `access_token` cookie. The OIDC flow keeps its CSRF state in the
//! `auth_state` cookie between the redirect and the callback.

use auth_identity::{LoginRequest, RegisterRequest, User};
use auth_oauth::OidcProvider;
use axum::{
    extract::{Query, State},
    http::{header::LOCATION, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, ApiErrorResponse};
use crate::middleware::AuthContext;
use crate::server::QuillServer;
use crate::session::{IssuedToken, ACCESS_TOKEN_COOKIE, AUTH_STATE_COOKIE};

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

impl SessionResponse {
    fn new(issued: IssuedToken, user: User) -> Self {
        Self {
            access_token: issued.token,
            token_type: "Bearer".to_string(),
            expires_in: issued.expires_in,
            user,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn cookie(server: &QuillServer, name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(server.sessions.secure_cookies())
        .same_site(SameSite::Lax)
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

fn oidc_provider(server: &QuillServer) -> Result<Arc<OidcProvider>, ApiError> {
    server
        .oidc
        .clone()
        .ok_or_else(|| ApiError::not_found("OIDC login"))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 400, description = "Invalid email or weak password", body = ApiErrorResponse),
        (status = 409, description = "Email already registered", body = ApiErrorResponse)
    )
)]
pub async fn register(
    State(server): State<QuillServer>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = server.identity.register(request).await?;
    info!(user_id = %user.id, email = %server.redactor.redact(&user.email), "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued and set as the access_token cookie", body = SessionResponse),
        (status = 401, description = "Invalid email or password", body = ApiErrorResponse)
    )
)]
pub async fn login(
    State(server): State<QuillServer>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let user = match server.identity.authenticate(&request.email, &request.password).await {
        Ok(user) => user,
        Err(err) => {
            warn!(email = %server.redactor.redact(&request.email), error = %err, "Login failed");
            return Err(err.into());
        }
    };
    let issued = server.sessions.issue(user.id)?;
    info!(user_id = %user.id, "User logged in");

    let jar = jar.add(cookie(&server, ACCESS_TOKEN_COOKIE, issued.token.clone()));
    Ok((jar, Json(SessionResponse::new(issued, user))))
}

/// Re-issue the session token of a signed-in user
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "Fresh session", body = SessionResponse),
        (status = 401, description = "No valid session", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn refresh(
    State(server): State<QuillServer>,
    ctx: AuthContext,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    let user = server.identity.find_user(ctx.user_id).await?;
    let issued = server.sessions.issue(user.id)?;

    let jar = jar.add(cookie(&server, ACCESS_TOKEN_COOKIE, issued.token.clone()));
    Ok((jar, Json(SessionResponse::new(issued, user))))
}

/// Redirect to the identity provider
#[utoipa::path(
    get,
    path = "/auth/oidc/login",
    tag = "auth",
    responses(
        (status = 302, description = "Redirect to the provider's authorization endpoint"),
        (status = 404, description = "OIDC login is disabled", body = ApiErrorResponse)
    )
)]
pub async fn oidc_login(State(server): State<QuillServer>, jar: CookieJar) -> Result<impl IntoResponse, ApiError> {
    let provider = oidc_provider(&server)?;
    let request = provider.authorization_url();

    let jar = jar.add(cookie(&server, AUTH_STATE_COOKIE, request.state));
    Ok((StatusCode::FOUND, jar, [(LOCATION, request.url)]))
}

/// Finish the code flow: check state, exchange the code, sign the user in
#[utoipa::path(
    get,
    path = "/auth/oidc/callback",
    tag = "auth",
    params(CallbackQuery),
    responses(
        (status = 302, description = "Signed in; redirect to the configured landing page"),
        (status = 400, description = "Missing code or state", body = ApiErrorResponse),
        (status = 401, description = "State mismatch or provider error", body = ApiErrorResponse),
        (status = 409, description = "Email belongs to an account and is not verified by the provider", body = ApiErrorResponse)
    )
)]
pub async fn oidc_callback(
    State(server): State<QuillServer>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let provider = oidc_provider(&server)?;

    if let Some(error) = query.error {
        return Err(ApiError::authentication(format!(
            "Identity provider returned {}: {}",
            error,
            query.error_description.unwrap_or_default()
        )));
    }
    let code = query.code.ok_or_else(|| ApiError::validation("missing code parameter"))?;
    let state = query.state.ok_or_else(|| ApiError::validation("missing state parameter"))?;

    let expected = jar.get(AUTH_STATE_COOKIE).map(|c| c.value().to_string());
    if expected.as_deref() != Some(state.as_str()) {
        return Err(ApiError::authentication("OIDC state does not match this browser session"));
    }

    let tokens = provider.exchange_code(&code, &state).await?;
    let claims = provider.fetch_claims(&tokens.access_token).await?;
    let user = server.identity.get_or_create_from_oidc(&claims).await?;
    let issued = server.sessions.issue(user.id)?;
    info!(user_id = %user.id, email = %server.redactor.redact(&user.email), "User logged in through OIDC");

    let jar = jar
        .remove(removal(AUTH_STATE_COOKIE))
        .add(cookie(&server, ACCESS_TOKEN_COOKIE, issued.token));
    Ok((StatusCode::FOUND, jar, [(LOCATION, server.config.oidc.success_redirect.clone())]))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses((status = 204, description = "Session cookies cleared"))
)]
pub async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let jar = jar.remove(removal(ACCESS_TOKEN_COOKIE)).remove(removal(AUTH_STATE_COOKIE));
    (jar, StatusCode::NO_CONTENT)
}
