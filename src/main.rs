use anyhow::Result;
use rollout_monitor::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// How often panels that reached their terminal state are dropped.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let registry = Arc::new(
        registry::HttpRegistry::new(
            &app_config.registry.base_url,
            Duration::from_millis(app_config.registry.request_timeout_ms),
        )
        .map_err(|e| anyhow::anyhow!("registry client: {}", e))?,
    );
    tracing::info!(registry = %app_config.registry.base_url, "registry client ready");

    let panels = Arc::new(monitor::Panels::new(
        registry,
        app_config.monitor.settings(),
    ));
    for plugin_id in &app_config.monitor.plugins {
        panels.mount(plugin_id).await;
    }

    let (prune_shutdown_tx, prune_shutdown_rx) = tokio::sync::oneshot::channel();
    let pruner_handle = monitor::spawn_pruner(panels.clone(), PRUNE_INTERVAL, prune_shutdown_rx);

    let app = routes::app(panels.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
        }
    }

    let _ = prune_shutdown_tx.send(());
    let _ = pruner_handle.await;
    panels.dispose_all().await;
    tracing::info!("All panels disposed");
    Ok(())
}
