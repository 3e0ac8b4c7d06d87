use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiErrorResponse};
use crate::middleware::AuthContext;
use crate::models::{CreatePostRequest, Post, UpdatePostRequest};
use crate::server::QuillServer;

/// Posts the caller can view
#[utoipa::path(
    get,
    path = "/posts",
    tag = "posts",
    responses(
        (status = 200, description = "Visible posts", body = Vec<Post>),
        (status = 401, description = "No valid session", body = ApiErrorResponse),
        (status = 503, description = "Authorization engine unreachable", body = ApiErrorResponse),
        (status = 504, description = "Authorization check timed out", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_posts(State(server): State<QuillServer>, ctx: AuthContext) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(server.posts.list(&ctx).await?))
}

#[utoipa::path(
    post,
    path = "/posts",
    tag = "posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created; the caller is its admin", body = Post),
        (status = 400, description = "Empty title", body = ApiErrorResponse),
        (status = 403, description = "Domain not visible to the caller", body = ApiErrorResponse),
        (status = 404, description = "Domain not found", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_post(
    State(server): State<QuillServer>,
    ctx: AuthContext,
    Json(request): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let post = server.posts.create(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[utoipa::path(
    get,
    path = "/posts/{id}",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 200, description = "The post", body = Post),
        (status = 403, description = "No view permission", body = ApiErrorResponse),
        (status = 404, description = "Post not found", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_post(
    State(server): State<QuillServer>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(server.posts.get(&ctx, id).await?))
}

#[utoipa::path(
    put,
    path = "/posts/{id}",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post id")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated post", body = Post),
        (status = 403, description = "No edit permission", body = ApiErrorResponse),
        (status = 404, description = "Post not found", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_post(
    State(server): State<QuillServer>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(server.posts.update(&ctx, id, request).await?))
}

#[utoipa::path(
    delete,
    path = "/posts/{id}",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post id")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 403, description = "No edit permission", body = ApiErrorResponse),
        (status = 404, description = "Post not found", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_post(
    State(server): State<QuillServer>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    server.posts.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
