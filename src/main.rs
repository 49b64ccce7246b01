//! Crash bet ledger API server

use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crash_bets_api::{
    build_router, config::Config, tracing_logger, AppState, BetRepository,
    InMemoryBetRepository, RateLimiter,
};

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_logger::init_subscriber();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(field = e.field(), "{}", e);
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let bets: Arc<dyn BetRepository> = Arc::new(InMemoryBetRepository::new());
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limiter()));
    let state = AppState::new(bets, rate_limiter.clone(), config.request_timeout());
    let app = build_router(state);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address()))?;

    let server = axum::Server::try_bind(&addr)
        .with_context(|| format!("failed to bind {}", addr))?
        .http1_header_read_timeout(config.read_timeout())
        .tcp_keepalive(Some(config.tcp_keepalive()))
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    info!(
        %addr,
        requests_per_minute = config.rate_limit.requests_per_minute,
        "API server listening"
    );

    let stop = CancellationToken::new();
    let mut server = tokio::spawn(server.with_graceful_shutdown(stop.clone().cancelled_owned()));

    tokio::select! {
        result = &mut server => {
            result.context("server task failed")?.context("server error")?;
        }
        _ = shutdown_signal() => {
            info!("shutting down server");
            stop.cancel();

            match tokio::time::timeout(config.shutdown_timeout(), &mut server).await {
                Ok(result) => {
                    if let Err(e) = result.context("server task failed")? {
                        error!(error = %e, "server error during shutdown");
                    }
                }
                Err(_) => {
                    warn!(timeout_secs = config.shutdown_timeout, "server forced to shutdown");
                    server.abort();
                }
            }
        }
    }

    if let Err(e) = rate_limiter.shutdown(config.shutdown_timeout()).await {
        warn!(error = %e, "rate limiter did not stop cleanly");
    }

    info!("server exited");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
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
                error!(error = %e, "failed to listen for SIGTERM");
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
