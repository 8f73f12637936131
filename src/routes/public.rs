use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Read-only pages plus the account gateway (register, login, logout). Handlers
/// here take `MaybeUser` so the layout can show who is logged in, but nothing is
/// refused for lack of a session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // Load balancer liveness probe.
        .route("/health", get(|| async { "ok" }))
        .route("/", get(handlers::list_posts))
        .route("/about", get(handlers::about))
        .route("/contact", get(handlers::contact))
        // GET /post/{id}
        // Post plus its comments. Missing id answers 404 without a comment query.
        .route("/post/{id}", get(handlers::show_post))
        .route(
            "/register",
            get(handlers::register_form).post(handlers::register_user),
        )
        .route("/login", get(handlers::login_form).post(handlers::login))
        // Destroys the session unconditionally.
        .route("/logout", get(handlers::logout))
}
