use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};

use ticket_forecast as api;
use api::services::{
    ForecastRefresher, ForecastService, HttpTicketSource, InMemoryTicketSource, SystemClock,
    TicketSource,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::metrics::init_metrics();

    // Ticket source: remote listing when configured, otherwise fed through the API
    let (source, feed): (Arc<dyn TicketSource>, Option<Arc<InMemoryTicketSource>>) =
        match cfg.forecast.source_url.as_deref() {
            Some(url) => {
                let http = HttpTicketSource::new(url, cfg.forecast.source_timeout())
                    .context("failed to build ticket source client")?;
                info!(url = %http.url(), "reading tickets from remote source");
                let source: Arc<dyn TicketSource> = Arc::new(http);
                (source, None)
            }
            None => {
                warn!("no ticket source URL configured; using in-memory source fed via the API");
                let memory = Arc::new(InMemoryTicketSource::new());
                let source: Arc<dyn TicketSource> = memory.clone();
                (source, Some(memory))
            }
        };

    let forecast = Arc::new(
        ForecastService::new(source, Arc::new(SystemClock), cfg.forecast.degree)
            .with_max_span_days(cfg.forecast.max_span_days),
    );
    let refresher = ForecastRefresher::spawn(forecast.clone(), cfg.forecast.refresh_interval());

    let app_state = api::AppState {
        config: cfg.clone(),
        forecast,
        feed,
        started: api::health::StartTime::default(),
    };
    let app = api::app_router(app_state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!("ticket-forecast listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    refresher.shutdown().await;

    if let Err(err) = &served {
        error!(error = %err, "server exited with error");
    }
    served?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
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
}
