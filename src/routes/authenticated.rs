use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Authenticated Router Module
///
/// Routes for any logged-in user. The `require_user` route layer redirects
/// anonymous requests to `/login` before the handler runs; handlers still take
/// `CurrentUser` because they need the identity.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // POST /post/{id}/comment
        // Adds a comment under the session's username, then redirects to the post.
        .route("/post/{id}/comment", post(handlers::add_comment))
}
