use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Post management. The whole router sits behind the `require_admin` route layer:
/// anonymous requests are redirected to `/login` and non-admin sessions get a 403.
///
/// The short paths (`/edit/{id}`, `/update/{id}`, `/delete/{id}`) are kept as
/// aliases so existing bookmarks and links keep working.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin", get(handlers::admin_panel))
        .route(
            "/add-post",
            get(handlers::new_post_form).post(handlers::create_post),
        )
        .route(
            "/edit-post/{id}",
            get(handlers::edit_post_form).post(handlers::update_post),
        )
        .route("/edit/{id}", get(handlers::edit_post_form))
        .route("/update/{id}", post(handlers::update_post))
        // GET /delete-post/{id}
        // Deletes the post and its comments atomically.
        .route("/delete-post/{id}", get(handlers::delete_post))
        .route("/delete/{id}", get(handlers::delete_post))
}
