use board_access_service::{
    build_router,
    config::AccessConfig,
    db,
    services::{Database, InMemoryStore},
    AppState, ServiceSettings,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::{init_tracing, install_prometheus_recorder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Fail fast on invalid configuration
    let config = AccessConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    let metrics_handle = install_prometheus_recorder()?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting board access service"
    );

    let auth_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.auth_attempts,
        config.rate_limit.auth_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );
    tracing::info!("Rate limiters initialized: Customer Auth and Global IP");

    let settings = ServiceSettings::from_config(&config);
    let policy = config.store_policy();
    let session_settings = config.session_settings();

    let state = match &config.database {
        Some(database) => {
            let pool = db::create_pool(database)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
            db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;

            let database = Database::new(pool);
            AppState::from_store(
                Arc::new(database.clone()),
                settings,
                policy,
                session_settings,
                auth_rate_limiter,
                ip_rate_limiter,
            )
            .with_database(database)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            AppState::from_store(
                Arc::new(InMemoryStore::new()),
                settings,
                policy,
                session_settings,
                auth_rate_limiter,
                ip_rate_limiter,
            )
        }
    }
    .with_metrics(metrics_handle);

    let app = build_router(state);

    let addr = config.common.socket_addr();

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
