use blog_portal::{
    AppResult, AppState,
    auth::seed_admin,
    config::{AppConfig, Env},
    create_router, mysql_session_store,
    repository::{MySqlRepository, RepositoryState},
};
use sqlx::mysql::MySqlPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower_sessions::ExpiredDeletion;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database pool and migrations, optional
/// admin seed, session store, then the HTTP server until a shutdown signal arrives.
#[tokio::main]
async fn main() -> AppResult<()> {
    // 1. Configuration
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging, RUST_LOG wins over the defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blog_portal=debug,tower_http=info,sqlx=warn".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database pool. Requests beyond max_connections wait at most
    // db_acquire_timeout for a connection, then fail on their own.
    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_acquire_timeout)
        .connect_with(config.connect_options())
        .await
        .inspect_err(|e| {
            tracing::error!(
                host = %config.db_host,
                port = config.db_port,
                database = %config.db_name,
                "Failed to connect to the database: {}",
                e
            )
        })?;

    tracing::info!(
        host = %config.db_host,
        max_connections = config.db_max_connections,
        tls = ?config.db_tls,
        "Database pool ready"
    );

    sqlx::migrate!("./migrations").run(&pool).await?;

    let repo = Arc::new(MySqlRepository::new(pool.clone())) as RepositoryState;

    // 4. Optional admin account
    if let Some(seed) = &config.admin_seed {
        seed_admin(repo.as_ref(), seed).await?;
    }

    // 5. Sessions live next to the data; expired rows are swept every minute.
    let session_store = mysql_session_store(pool.clone(), &config.db_name).await?;
    let sweeper = session_store.clone();
    let deletion_task = tokio::task::spawn(async move {
        if let Err(e) = sweeper
            .continuously_delete_expired(Duration::from_secs(60))
            .await
        {
            tracing::error!("Expired-session sweeper stopped: {}", e);
        }
    });

    // 6. Router and server
    let listen_addr = format!("0.0.0.0:{}", config.listen_port);
    let app = create_router(AppState { repo, config }, session_store);

    let listener = TcpListener::bind(&listen_addr).await?;
    tracing::info!("Listening on {}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 7. Stop the sweeper, then drain the pool once nothing can use it any more.
    deletion_task.abort();
    pool.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
