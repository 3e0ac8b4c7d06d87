use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiErrorResponse};
use crate::middleware::AuthContext;
use crate::models::{AddMemberRequest, CreateDomainRequest, Domain, PermissionResponse};
use crate::server::QuillServer;
use crate::services::Membership;

#[utoipa::path(
    post,
    path = "/domains",
    tag = "domains",
    request_body = CreateDomainRequest,
    responses(
        (status = 201, description = "Domain created; the caller is its admin", body = Domain),
        (status = 400, description = "Empty name", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_domain(
    State(server): State<QuillServer>,
    ctx: AuthContext,
    Json(request): Json<CreateDomainRequest>,
) -> Result<(StatusCode, Json<Domain>), ApiError> {
    let domain = server.domains.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(domain)))
}

#[utoipa::path(
    post,
    path = "/domains/{id}/members",
    tag = "domains",
    params(("id" = Uuid, Path, description = "Domain id")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Role granted", body = Membership),
        (status = 403, description = "No edit permission on the domain", body = ApiErrorResponse),
        (status = 404, description = "Domain or user not found", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_member(
    State(server): State<QuillServer>,
    ctx: AuthContext,
    Path(domain_id): Path<Uuid>,
    Json(request): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<Membership>), ApiError> {
    let membership = server.domains.add_member(&ctx, domain_id, request).await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

/// `{"allowed": bool}` for the caller; a denial is not an error here
#[utoipa::path(
    get,
    path = "/domains/{id}/permissions/{permission}",
    tag = "domains",
    params(
        ("id" = Uuid, Path, description = "Domain id"),
        ("permission" = String, Path, description = "`view` or `edit`")
    ),
    responses(
        (status = 200, description = "Decision for the caller", body = PermissionResponse),
        (status = 400, description = "Unknown permission", body = ApiErrorResponse),
        (status = 404, description = "Domain not found", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_permission(
    State(server): State<QuillServer>,
    ctx: AuthContext,
    Path((domain_id, permission)): Path<(Uuid, String)>,
) -> Result<Json<PermissionResponse>, ApiError> {
    let allowed = server.domains.check_permission(&ctx, domain_id, &permission).await?;
    Ok(Json(PermissionResponse { allowed }))
}
