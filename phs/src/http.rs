use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{exporter::metrics_router, router::ApiRoutes};
use crate::app_state::SharedAppState;
use crate::stop_flag::StopFlag;

async fn serve(
    name: &'static str,
    app: Router,
    bind_address: &str,
    stop_flag: StopFlag,
) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
    let listener = TcpListener::bind(bind_address).await?;
    info!("{} listening on {}", name, listener.local_addr()?);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                stop_flag.wait().await;
                info!("Stop flag was set, shutting down {} gracefully", name);
            })
            .await?;
        info!("{} is down", name);
        Ok(())
    });

    Ok(handle)
}

pub async fn setup_http_server(
    app_state: SharedAppState,
    bind_address: &str,
) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
    let app = ApiRoutes::create(app_state.clone());
    serve("API server", app, bind_address, app_state.stop_flag.clone()).await
}

pub async fn setup_metrics_server(
    app_state: SharedAppState,
    bind_address: &str,
) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
    let app = metrics_router(app_state.registry.clone());
    serve("Metrics server", app, bind_address, app_state.stop_flag.clone()).await
}
