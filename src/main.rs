use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use pitch_backend::api::{self, PaymentState};
use pitch_backend::config::AppConfig;
use pitch_backend::database::instruction_repository::InstructionRepository;
use pitch_backend::database::{init_pool, run_migrations, PoolConfig};
use pitch_backend::health::{HealthChecker, HealthState};
use pitch_backend::logging::init_tracing;
use pitch_backend::middleware::{request_logging_middleware, UuidRequestId};
use pitch_backend::payments::epdq::EpdqClient;
use pitch_backend::secrets::{EnvSecretStore, SecretCache};
use pitch_backend::services::PaymentConfirmationService;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "pitch-backend",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(checker): State<Arc<HealthChecker>>) -> impl IntoResponse {
    let status = checker.check().await;
    let code = if status.status == HealthState::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn liveness() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "🚀 Starting pitch payment backend"
    );

    info!("📊 Initializing database connection pool...");
    let mut pool_config = PoolConfig {
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connection_timeout: std::time::Duration::from_secs(config.database.connection_timeout),
        ..PoolConfig::default()
    };
    if let Some(idle) = config.database.idle_timeout {
        pool_config.idle_timeout = std::time::Duration::from_secs(idle);
    }
    let pool = init_pool(&config.database.url, Some(pool_config))
        .await
        .map_err(|e| {
            error!("Failed to initialize database pool: {}", e);
            anyhow::anyhow!(e)
        })?;
    run_migrations(&pool).await.map_err(|e| {
        error!("Failed to run migrations: {}", e);
        anyhow::anyhow!(e)
    })?;
    info!("✅ Database connection pool initialized");

    let store = Arc::new(InstructionRepository::new(pool.clone()));
    let secrets = Arc::new(SecretCache::new(Arc::new(EnvSecretStore)));
    let gateway = Arc::new(EpdqClient::new(config.gateway.clone())?);
    let service = Arc::new(PaymentConfirmationService::new(
        store.clone(),
        gateway,
        secrets,
    ));
    let payment_state = Arc::new(PaymentState {
        service,
        store: store.clone(),
    });

    let health_checker = Arc::new(HealthChecker::new(pool.clone()));

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(health))
        .route("/health/live", get(liveness))
        .with_state(health_checker)
        .merge(api::router(payment_state))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}
