//! meshgate relay entry point.
//!
//! This binary is the composition root for the workspace. Responsibilities:
//!
//! 1. **Load configuration** — an optional file named by `MESHGATE_CONFIG`,
//!    overridden by `MESHGATE__*` environment variables (see [`settings`]).
//! 2. **Wire observability** — a JSON `tracing-subscriber` layer plus, when an
//!    OTLP endpoint is configured, an OpenTelemetry exporter. All spans and
//!    events emitted by every crate in the workspace flow through it.
//! 3. **Construct infrastructure** — build the [`client::MeshClient`] with its
//!    stock adapters and service registry from configuration.
//! 4. **Serve** — run the relay router (see [`relay`]) until Ctrl-C or SIGTERM.

mod observability;
mod relay;
mod settings;

use anyhow::Context;
use client::MeshClient;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = settings::load().context("configuration could not be loaded")?;
    let telemetry = observability::init(config.otlp_endpoint.as_deref())?;

    let client = MeshClient::builder_from_config(&config.client)
        .context("outbound client configuration is invalid")?
        .build()?;

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("could not bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "meshgate relay listening");

    axum::serve(listener, relay::router(client))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server failed")?;

    info!("meshgate relay stopped");
    telemetry.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl-C handler could not be installed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler could not be installed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
