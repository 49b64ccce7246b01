//! Fixed-window rate limiting per client

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    error::AppError,
    AppState,
};

/// Probe routes that are never throttled
pub const EXEMPT_PATHS: [&str; 3] = ["/health", "/ready", "/live"];

const DEFAULT_REQUESTS_PER_WINDOW: u32 = 60;
const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Requests admitted per client per window
    pub requests_per_window: u32,
    pub window: Duration,
    /// How often stale clients are swept. Should be coarser than `window`.
    pub cleanup_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_window: DEFAULT_REQUESTS_PER_WINDOW,
            window: Duration::from_secs(60),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

/// The sweeper did not stop within the caller's bound
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShutdownError {
    #[error("rate limiter shutdown timed out after {0:?}")]
    Timeout(Duration),
}

/// Window state for one client
#[derive(Debug, Clone)]
struct ClientWindow {
    count: u32,
    window_start: Instant,
}

/// Client table shared with the sweeper task
#[derive(Debug)]
struct ClientTable {
    clients: Mutex<HashMap<String, ClientWindow>>,
    requests_per_window: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl ClientTable {
    async fn allow(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut clients = self.clients.lock().await;

        let Some(client) = clients.get_mut(key) else {
            clients.insert(
                key.to_string(),
                ClientWindow {
                    count: 1,
                    window_start: now,
                },
            );
            return true;
        };

        if now.saturating_duration_since(client.window_start) >= self.window {
            client.count = 1;
            client.window_start = now;
            return true;
        }

        if client.count >= self.requests_per_window {
            return false;
        }

        client.count += 1;
        true
    }

    async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut clients = self.clients.lock().await;
        let before = clients.len();

        clients.retain(|_, client| now.saturating_duration_since(client.window_start) <= self.window);

        before - clients.len()
    }
}

/// Per-client fixed-window limiter with a background expiry task.
///
/// A client may burst up to twice the limit across a window boundary.
#[derive(Debug)]
pub struct RateLimiter {
    table: Arc<ClientTable>,
    cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Create a limiter and start its sweeper. Must be called inside a tokio runtime.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        let requests_per_window = if config.requests_per_window == 0 {
            DEFAULT_REQUESTS_PER_WINDOW
        } else {
            config.requests_per_window
        };

        // A zero period would panic inside the sweeper
        let cleanup_interval = if config.cleanup_interval.is_zero() {
            DEFAULT_CLEANUP_INTERVAL
        } else {
            config.cleanup_interval
        };

        let table = Arc::new(ClientTable {
            clients: Mutex::new(HashMap::new()),
            requests_per_window,
            window: config.window,
            clock,
        });
        let cancel = CancellationToken::new();
        let sweeper = tokio::spawn(run_sweeper(
            table.clone(),
            cleanup_interval,
            cancel.clone(),
        ));

        Self {
            table,
            cancel,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Admit or reject one request from `client_key`
    pub async fn allow(&self, client_key: &str) -> bool {
        self.table.allow(client_key).await
    }

    pub fn limit(&self) -> u32 {
        self.table.requests_per_window
    }

    pub fn window(&self) -> Duration {
        self.table.window
    }

    /// Drop clients whose window started more than one window ago
    pub async fn sweep_expired(&self) -> usize {
        self.table.sweep().await
    }

    pub async fn tracked_clients(&self) -> usize {
        self.table.clients.lock().await.len()
    }

    /// Stop the sweeper after one final sweep, waiting at most `timeout`
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ShutdownError> {
        info!("shutting down rate limiter");
        self.cancel.cancel();

        let mut sweeper = self.sweeper.lock().await;
        let Some(mut handle) = sweeper.take() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => {
                if let Err(e) = joined {
                    warn!(error = %e, "rate limiter sweeper ended abnormally");
                }
                info!("rate limiter shutdown complete");
                Ok(())
            }
            Err(_) => {
                *sweeper = Some(handle);
                warn!(timeout_ms = timeout.as_millis() as u64, "rate limiter shutdown timed out");
                Err(ShutdownError::Timeout(timeout))
            }
        }
    }
}

async fn run_sweeper(table: Arc<ClientTable>, every: Duration, cancel: CancellationToken) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_secs = every.as_secs(),
        window_secs = table.window.as_secs(),
        "rate limiter cleanup task started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let removed = table.sweep().await;
                info!(removed, "rate limiter cleanup task stopped");
                break;
            }
            _ = ticker.tick() => {
                let removed = table.sweep().await;
                debug!(removed, "rate limiter sweep");
            }
        }
    }
}

/// Identify the caller: first forwarded address, then real IP, then the peer
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware
pub async fn rate_limit_middleware<B>(
    State(state): State<AppState>,
    request: Request<B>,
    next: Next<B>,
) -> Response {
    let path = request.uri().path();
    if EXEMPT_PATHS.contains(&path) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer);
    let limiter = &state.rate_limiter;

    if !limiter.allow(&key).await {
        warn!(
            client = %key,
            path = %path,
            method = %request.method(),
            "rate limit exceeded"
        );
        return AppError::RateLimitExceeded {
            retry_after: limiter.window().as_secs(),
        }
        .into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("x-ratelimit-limit", HeaderValue::from(limiter.limit()));

    response
}
