//! Crash bet ledger API
//!
//! In-memory bet ledger with a per-user index and a query engine, served
//! over HTTP behind a per-client fixed-window rate limiter.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

pub mod clock;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod handlers;
pub mod health_check_endpoints;
pub mod list_query;
pub mod rate_limit;
pub mod routes;
pub mod tracing_logger;
pub mod tracing_middleware;
pub mod types;
pub mod validation;

pub use db::{BetRepository, InMemoryBetRepository};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use routes::build_router;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub bets: Arc<dyn BetRepository>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
    /// Deadline applied to each store call made by a handler
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        bets: Arc<dyn BetRepository>,
        rate_limiter: Arc<RateLimiter>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            bets,
            rate_limiter,
            started_at: Instant::now(),
            request_timeout,
        }
    }
}
