use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::LazyLock;
use tower_sessions::Session;

use crate::{
    config::AdminSeed,
    error::{AppError, AppResult},
    models::{Role, SessionUser},
    repository::Repository,
};

/// Session key under which the logged-in `SessionUser` is stored.
pub const SESSION_USER_KEY: &str = "user";

// --- Session helpers ---

/// Reads the logged-in identity from the session, if any.
pub async fn session_user(session: &Session) -> AppResult<Option<SessionUser>> {
    Ok(session.get::<SessionUser>(SESSION_USER_KEY).await?)
}

/// start_session
///
/// Marks the session as authenticated. The id is cycled before the identity is
/// written, so the pre-login id stops being valid.
pub async fn start_session(session: &Session, user: &SessionUser) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(SESSION_USER_KEY, user).await?;
    Ok(())
}

/// Destroys the session and its data.
pub async fn end_session(session: &Session) -> AppResult<()> {
    session.flush().await?;
    Ok(())
}

// --- Guard extractors ---

/// AuthRejection
///
/// What the guard answers when a request may not proceed. Missing login is not an
/// error: the browser is sent to the login page.
#[derive(Debug)]
pub enum AuthRejection {
    LoginRequired,
    Forbidden,
    Failed(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::LoginRequired => Redirect::to("/login").into_response(),
            AuthRejection::Forbidden => AppError::Forbidden.into_response(),
            AuthRejection::Failed(e) => e.into_response(),
        }
    }
}

async fn resolve_session_user<S>(
    parts: &mut Parts,
    state: &S,
) -> Result<Option<SessionUser>, AuthRejection>
where
    S: Send + Sync,
{
    // The session layer wraps the whole router, so a missing session means the
    // router was assembled without it.
    let session = Session::from_request_parts(parts, state)
        .await
        .map_err(|(_, msg)| AuthRejection::Failed(AppError::Internal(msg.to_string())))?;

    session_user(&session).await.map_err(AuthRejection::Failed)
}

/// MaybeUser
///
/// The logged-in identity if there is one. Never rejects on a missing login.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_session_user(parts, state).await?))
    }
}

/// CurrentUser
///
/// Requires a logged-in session of any role. Anonymous requests are redirected to
/// `/login`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve_session_user(parts, state)
            .await?
            .map(CurrentUser)
            .ok_or(AuthRejection::LoginRequired)
    }
}

/// AdminUser
///
/// Requires a logged-in session whose role is admin. Anonymous requests are
/// redirected to `/login`; ordinary users get a 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub SessionUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match resolve_session_user(parts, state).await? {
            Some(user) if user.is_admin() => Ok(AdminUser(user)),
            Some(user) => {
                tracing::warn!(user = %user.username, "Non-admin session refused");
                Err(AuthRejection::Forbidden)
            }
            None => Err(AuthRejection::LoginRequired),
        }
    }
}

// --- Passwords ---

/// Outcome of checking a submitted password against the stored value.
#[derive(Debug, PartialEq, Eq)]
pub enum PasswordCheck {
    Valid,
    /// The stored value is a plaintext password that matched; it should be re-hashed.
    LegacyPlaintext,
    Invalid,
}

/// Hashes a password with Argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

/// verify_password
///
/// Anything that does not parse as a PHC string is treated as a row written before
/// hashing existed and compared as plaintext.
pub fn verify_password(password: &str, stored: &str) -> PasswordCheck {
    match PasswordHash::new(stored) {
        Ok(parsed) => {
            if Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
            {
                PasswordCheck::Valid
            } else {
                PasswordCheck::Invalid
            }
        }
        Err(_) if stored == password => PasswordCheck::LegacyPlaintext,
        Err(_) => PasswordCheck::Invalid,
    }
}

// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_off_thread(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

// Verified against when the username is unknown, so a miss costs one argon2 run
// just like a hit.
static UNKNOWN_USER_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("unknown-user").ok());

async fn verify_unknown_user(password: String) -> AppResult<()> {
    tokio::task::spawn_blocking(move || {
        if let Some(hash) = UNKNOWN_USER_HASH.as_deref() {
            let _ = verify_password(&password, hash);
        }
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))
}

async fn verify_off_thread(password: String, stored: String) -> AppResult<PasswordCheck> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

// --- Account flows ---

/// register
///
/// Creates an ordinary user. A taken username surfaces as `AppError::UsernameTaken`
/// and leaves the existing account untouched.
pub async fn register(repo: &dyn Repository, username: &str, password: &str) -> AppResult<i64> {
    let hash = hash_off_thread(password.to_string()).await?;
    let id = repo.create_user(username, &hash, Role::User).await?;
    tracing::info!(user_id = id, username = %username, "User registered");
    Ok(id)
}

/// authenticate
///
/// Returns the session identity for a matching username/password pair, `None`
/// otherwise. Legacy plaintext passwords are upgraded to a hash on the first
/// successful login.
pub async fn authenticate(
    repo: &dyn Repository,
    username: &str,
    password: &str,
) -> AppResult<Option<SessionUser>> {
    let Some(user) = repo.find_user_by_username(username).await? else {
        verify_unknown_user(password.to_string()).await?;
        return Ok(None);
    };

    match verify_off_thread(password.to_string(), user.password.clone()).await? {
        PasswordCheck::Valid => Ok(Some(SessionUser::from(&user))),
        PasswordCheck::LegacyPlaintext => {
            let hash = hash_off_thread(password.to_string()).await?;
            repo.set_password_hash(user.id, &hash).await?;
            tracing::info!(user_id = user.id, "Upgraded plaintext password to argon2");
            Ok(Some(SessionUser::from(&user)))
        }
        PasswordCheck::Invalid => Ok(None),
    }
}

/// seed_admin
///
/// Ensures the configured administrator exists. An existing account with that name
/// is left as it is.
pub async fn seed_admin(repo: &dyn Repository, seed: &AdminSeed) -> AppResult<()> {
    if repo.find_user_by_username(&seed.username).await?.is_some() {
        tracing::info!(username = %seed.username, "Admin seed skipped, user exists");
        return Ok(());
    }

    let hash = hash_off_thread(seed.password.clone()).await?;
    match repo.create_user(&seed.username, &hash, Role::Admin).await {
        // Another instance seeded it between the lookup and the insert.
        Ok(_) | Err(AppError::UsernameTaken) => {
            tracing::info!(username = %seed.username, "Admin account ensured");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
