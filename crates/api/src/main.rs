use std::net::SocketAddr;
use std::sync::Arc;

use dbprov_cloud::{ProviderConfig, ProviderRegistry};
use dbprov_engine::{DrafterConfig, HttpDrafter, Orchestrator, OrchestratorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dbprov_api::config::ServerConfig;
use dbprov_api::router::build_app_router;
use dbprov_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dbprov_api=debug,dbprov_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        projects_root = %config.projects_root.display(),
        "Loaded server configuration",
    );

    // --- Providers ---
    let registry = ProviderRegistry::from_config(&ProviderConfig::from_env());
    let available: Vec<&str> = registry
        .available_providers()
        .into_iter()
        .map(|kind| kind.name())
        .collect();
    if available.is_empty() {
        tracing::warn!("No database provider is configured; provisioning runs will fail");
    } else {
        tracing::info!(providers = ?available, "Database providers configured");
    }

    // --- Orchestrator ---
    let mut orchestrator = Orchestrator::new(registry, OrchestratorConfig::from_env());
    match DrafterConfig::from_env() {
        Some(drafter) => {
            tracing::info!(model = %drafter.model, "AI drafting enabled");
            orchestrator = orchestrator.with_drafter(Arc::new(HttpDrafter::new(drafter)));
        }
        None => tracing::info!("AI drafting disabled (AI_API_URL, AI_API_KEY, AI_MODEL unset)"),
    }

    let state = AppState::new(orchestrator, config.clone());
    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped");
}

/// Wait for Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
