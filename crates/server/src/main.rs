//! Server entry point

use std::net::SocketAddr;

use clauselens_config::{load_settings, Settings};
use clauselens_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("CLAUSELENS_ENV").ok();
    let config = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized, use eprintln for early logging
            eprintln!("Warning: failed to load config: {}. Using defaults.", e);
            Settings::default()
        },
    };

    init_tracing(&config);

    tracing::info!("Starting ClauseLens server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_env = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    let _metrics_handle = init_metrics();
    tracing::info!("Initialized Prometheus metrics at /metrics");

    let port = config.server.port;
    let state = AppState::from_settings(config)?;
    tracing::info!(
        store_enabled = state.config.read().store.enabled,
        analytics_enabled = state.analytics.is_some(),
        "Initialized application state"
    );

    let shutdown_state = state.clone();
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_stop_signal())
        .await?;

    // Flush outbound analytics before exit
    shutdown_state.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves once the process is asked to stop (interrupt or SIGTERM)
async fn wait_for_stop_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "Cannot listen for SIGTERM, interrupt only");
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("Interrupt received, draining requests");
                return;
            },
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, draining requests");
            },
            _ = sigterm.recv() => {
                tracing::info!("SIGTERM received, draining requests");
            },
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Interrupt received, draining requests");
    }
}

fn init_tracing(config: &Settings) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("clauselens={},tower_http=info", config.server.log_level).into()
    });

    let fmt_layer = if config.server.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
