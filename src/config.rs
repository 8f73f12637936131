use std::{env, str::FromStr, time::Duration};

use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared read-only through `AppState`, so every handler and the repository see the
/// same values for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and cookie security.
    pub env: Env,
    // Database server host name.
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    // Schema holding the users, posts and comments tables.
    pub db_name: String,
    // TLS policy for the database connection.
    pub db_tls: DbTls,
    // Upper bound on pooled database connections.
    pub db_max_connections: u32,
    // How long a request waits for a free pooled connection before failing.
    pub db_acquire_timeout: Duration,
    // Port the HTTP server listens on.
    pub listen_port: u16,
    // Sessions expire after this many minutes without a request. Always positive.
    pub session_ttl_minutes: u32,
    // Optional administrator account ensured at startup.
    pub admin_seed: Option<AdminSeed>,
}

/// Env
///
/// Defines the runtime context: pretty logs and plain cookies locally, JSON logs and
/// `Secure` cookies in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// DbTls
///
/// TLS policy for the database connection. Kept as explicit configuration because
/// managed MySQL-compatible services (TiDB Cloud, PlanetScale) require TLS while a
/// local server usually has none.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DbTls {
    Disabled,
    Preferred,
    Required,
    VerifyCa,
    VerifyIdentity,
}

impl FromStr for DbTls {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "false" => Ok(DbTls::Disabled),
            "preferred" => Ok(DbTls::Preferred),
            "required" | "on" | "true" => Ok(DbTls::Required),
            "verify-ca" | "verify_ca" => Ok(DbTls::VerifyCa),
            "verify-identity" | "verify_identity" => Ok(DbTls::VerifyIdentity),
            other => Err(format!("unknown DB_TLS mode '{}'", other)),
        }
    }
}

impl From<DbTls> for MySqlSslMode {
    fn from(tls: DbTls) -> Self {
        match tls {
            DbTls::Disabled => MySqlSslMode::Disabled,
            DbTls::Preferred => MySqlSslMode::Preferred,
            DbTls::Required => MySqlSslMode::Required,
            DbTls::VerifyCa => MySqlSslMode::VerifyCa,
            DbTls::VerifyIdentity => MySqlSslMode::VerifyIdentity,
        }
    }
}

/// AdminSeed
///
/// Credentials for the administrator account created at startup when both
/// `ADMIN_USERNAME` and `ADMIN_PASSWORD` are present.
#[derive(Clone)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// Deterministic configuration used by tests and as the fallback for every
    /// variable `load` cannot read.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_host: "localhost".to_string(),
            db_port: 3306,
            db_user: "root".to_string(),
            db_password: String::new(),
            db_name: "blog".to_string(),
            db_tls: DbTls::Preferred,
            db_max_connections: 10,
            db_acquire_timeout: Duration::from_secs(30),
            listen_port: 3000,
            session_ttl_minutes: 60,
            admin_seed: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. Every variable is
    /// optional; a missing one takes the `Default` value and a malformed one is
    /// reported with a warning and then ignored.
    pub fn load() -> Self {
        let defaults = Self::default();

        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let admin_seed = match (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.is_empty() && !password.is_empty() => {
                Some(AdminSeed { username, password })
            }
            _ => None,
        };

        Self {
            env,
            db_host: env::var("DB_HOST").unwrap_or(defaults.db_host),
            db_port: parse_var("DB_PORT", defaults.db_port),
            db_user: env::var("DB_USER").unwrap_or(defaults.db_user),
            db_password: env::var("DB_PASSWORD").unwrap_or(defaults.db_password),
            db_name: env::var("DB_NAME").unwrap_or(defaults.db_name),
            db_tls: parse_var("DB_TLS", defaults.db_tls),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            db_acquire_timeout: Duration::from_secs(parse_var(
                "DB_ACQUIRE_TIMEOUT_SECS",
                defaults.db_acquire_timeout.as_secs(),
            )),
            listen_port: parse_var("PORT", defaults.listen_port),
            session_ttl_minutes: parse_positive("SESSION_TTL_MINUTES", defaults.session_ttl_minutes),
            admin_seed,
        }
    }

    /// connect_options
    ///
    /// Builds the sqlx connection options for the configured database, including the
    /// TLS mode.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.db_host)
            .port(self.db_port)
            .username(&self.db_user)
            .password(&self.db_password)
            .database(&self.db_name)
            .ssl_mode(self.db_tls.into())
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!("Ignoring {}={:?}: {}", name, raw, e);
            default
        }),
        Err(_) => default,
    }
}

// A zero TTL would expire every session on issue.
fn parse_positive(name: &str, default: u32) -> u32 {
    match parse_var(name, default) {
        0 => {
            tracing::warn!("Ignoring {}=0: must be positive", name);
            default
        }
        value => value,
    }
}
