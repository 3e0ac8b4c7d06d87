//! Quill server - posts and domains behind session login and Permify checks
//!
//! This library provides the HTTP side of Quill: configuration, session
//! tokens, the authentication extractor, post and domain services and the
//! route table. The binary in `main.rs` wires it to a listener.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod services;
pub mod session;

pub use config::AppConfig;
pub use error::{ApiError, ApiErrorResponse};
pub use server::QuillServer;

use axum::{body::Body, http::Request, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Span;

/// Create the application router. Request spans are children of the span
/// current at the call, so callers enter the service's root span first.
pub fn create_app(server: QuillServer) -> Router {
    let root = Span::current();

    routes::create_routes()
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
                tracing::info_span!(
                    parent: &root,
                    "request",
                    method = %request.method(),
                    uri = %request.uri()
                )
            })),
        )
        .with_state(server)
}
