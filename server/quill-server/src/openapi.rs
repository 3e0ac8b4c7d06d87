use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::server::QuillServer;

pub const SWAGGER_UI_PATH: &str = "/swagger";
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// OpenAPI description of every Quill route
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::auth::refresh,
        crate::handlers::auth::logout,
        crate::handlers::auth::oidc_login,
        crate::handlers::auth::oidc_callback,
        crate::handlers::posts::list_posts,
        crate::handlers::posts::create_post,
        crate::handlers::posts::get_post,
        crate::handlers::posts::update_post,
        crate::handlers::posts::delete_post,
        crate::handlers::domains::create_domain,
        crate::handlers::domains::add_member,
        crate::handlers::domains::check_permission,
    ),
    components(
        schemas(
            crate::handlers::health::HealthResponse,
            crate::handlers::auth::SessionResponse,
            crate::models::Post,
            crate::models::Domain,
            crate::models::CreatePostRequest,
            crate::models::UpdatePostRequest,
            crate::models::CreateDomainRequest,
            crate::models::AddMemberRequest,
            crate::models::PermissionResponse,
            crate::services::Membership,
            crate::error::ApiErrorResponse,
            auth_identity::User,
            auth_identity::RegisterRequest,
            auth_identity::LoginRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Password and OpenID Connect login"),
        (name = "posts", description = "Posts gated by view and edit permissions"),
        (name = "domains", description = "Domains, membership and permission checks"),
    ),
    info(
        title = "Quill API",
        version = "0.1.0",
        description = "Posts and domains behind session login and Permify authorization.",
    ),
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme the secured paths refer to
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Swagger UI under `/swagger` and the raw document at `/api-docs/openapi.json`
pub fn create_docs_routes() -> Router<QuillServer> {
    Router::new().merge(SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_JSON_PATH, ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for path in [
            "/health",
            "/auth/login",
            "/auth/oidc/callback",
            "/posts",
            "/posts/{id}",
            "/domains/{id}/members",
            "/domains/{id}/permissions/{permission}",
        ] {
            assert!(paths.contains(&path), "missing {}", path);
        }

        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("Post"));
    }
}
