pub mod paths;

use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    handlers::{auth, domains, health, posts},
    openapi,
    server::QuillServer,
};

pub fn health_routes() -> Router<QuillServer> {
    Router::new().route(paths::health::HEALTH, get(health::health_check))
}

pub fn auth_routes() -> Router<QuillServer> {
    Router::new()
        .route(paths::auth::REGISTER, post(auth::register))
        .route(paths::auth::LOGIN, post(auth::login))
        .route(paths::auth::REFRESH, post(auth::refresh))
        .route(paths::auth::LOGOUT, post(auth::logout))
        .route(paths::auth::OIDC_LOGIN, get(auth::oidc_login))
        .route(paths::auth::OIDC_CALLBACK, get(auth::oidc_callback))
}

pub fn post_routes() -> Router<QuillServer> {
    Router::new()
        .route(paths::posts::POSTS, get(posts::list_posts).post(posts::create_post))
        .route(
            paths::posts::POST_BY_ID,
            get(posts::get_post).put(posts::update_post).delete(posts::delete_post),
        )
}

pub fn domain_routes() -> Router<QuillServer> {
    Router::new()
        .route(paths::domains::DOMAINS, post(domains::create_domain))
        .route(paths::domains::MEMBERS, post(domains::add_member))
        .route(paths::domains::PERMISSION, get(domains::check_permission))
}

pub fn create_routes() -> Router<QuillServer> {
    Router::new()
        .merge(health_routes())
        .merge(auth_routes())
        .merge(post_routes())
        .merge(domain_routes())
        .merge(openapi::create_docs_routes())
}
