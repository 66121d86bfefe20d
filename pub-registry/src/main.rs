use pub_registry::{
    build_router,
    config::RegistryConfig,
    db,
    services::{storage, EmailService},
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    let config = RegistryConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);
    service_core::response::set_app_code(config.app_code.clone());

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting pub registry"
    );

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

    if config.database.auto_migrate {
        db::run_migrations(&pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
    }

    let storage: Arc<dyn storage::Storage> = Arc::from(storage::from_config(&config.storage).await?);
    tracing::info!(backend = ?config.storage.backend, "Storage initialized");

    let email = Arc::new(EmailService::new(&config.smtp)?);
    tracing::info!("Email service initialized");

    let addr = config.common.bind_addr();
    let seed_admin = config.seed_admin;
    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );

    let state = AppState::new(config, pool, storage, email);

    if seed_admin {
        state.users.seed_admin().await?;
    }

    let app = build_router(state);

    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM; in-flight requests are drained by `axum::serve`.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        result = signal::ctrl_c() => {
            result.expect("failed to install Ctrl+C handler");
            "SIGINT"
        }
        _ = terminate => "SIGTERM",
    };

    tracing::info!(signal = received, "Shutting down, draining connections");
}
