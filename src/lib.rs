use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use sqlx::MySqlPool;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::MySqlStore;
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod repository;
pub mod views;

// Routing split by access level (public, authenticated, admin).
pub mod routes;
use auth::{AdminUser, CurrentUser};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::{AppConfig, Env};
pub use error::{AppError, AppResult};
pub use memory::InMemoryRepository;
pub use repository::{MySqlRepository, Repository, RepositoryState};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "blog.sid";

/// AppState
///
/// Everything a handler may depend on, built once in `main` and cloned cheaply into
/// each request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer, backed by the connection pool created at startup.
    pub repo: RepositoryState,
    pub config: AppConfig,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// require_user
///
/// Route layer for the authenticated group. The `CurrentUser` extractor rejects
/// anonymous requests with a redirect to `/login` before the handler runs.
async fn require_user(_user: CurrentUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// require_admin
///
/// Route layer for the admin group. Anonymous requests are redirected to `/login`,
/// non-admin sessions are refused with 403.
async fn require_admin(_admin: AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// session_layer
///
/// Cookie-identified sessions over `store`. Sessions end on logout or after
/// `session_ttl_minutes` without a request.
pub fn session_layer<S>(store: S, config: &AppConfig) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE)
        .with_secure(config.env == Env::Production)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            config.session_ttl_minutes.into(),
        )))
}

/// Name of the table holding session records, next to users/posts/comments.
pub const SESSION_TABLE: &str = "sessions";

/// mysql_session_store
///
/// Session store living in the application database (`schema`), with its table
/// created if missing. Expired rows are removed by the store's
/// `continuously_delete_expired` task, spawned in `main`.
pub async fn mysql_session_store(pool: MySqlPool, schema: &str) -> AppResult<MySqlStore> {
    let store = MySqlStore::new(pool)
        .with_schema_name(schema)
        .map_err(AppError::Internal)?
        .with_table_name(SESSION_TABLE)
        .map_err(AppError::Internal)?;
    store.migrate().await?;
    Ok(store)
}

/// create_router
///
/// Assembles the routing table, applies the per-group guards, the session layer
/// over `store` and the observability stack, and registers the application state.
pub fn create_router<S>(state: AppState, store: S) -> Router
where
    S: SessionStore + Clone,
{
    let x_request_id = HeaderName::from_static("x-request-id");
    let sessions = session_layer(store, &state.config);

    let base_router = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_user,
            )),
        )
        .merge(
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_admin,
            )),
        )
        .with_state(state);

    // Sessions must wrap the route layers above, since the guards read them.
    base_router.layer(sessions).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Opens the per-request span with method, URI and the generated `x-request-id`, so
/// every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
