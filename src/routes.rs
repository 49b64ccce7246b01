//! Router and middleware stack

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    BoxError, Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::{
    error::AppError,
    handlers, health_check_endpoints,
    rate_limit::rate_limit_middleware,
    tracing_middleware::request_tracing,
    validation::MAX_BODY_SIZE,
    AppState,
};

async fn handle_timeout_error(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::RequestTimeout
    } else {
        AppError::Internal(err.to_string())
    }
}

/// Build the application router.
///
/// Layers, outermost first: request id and access log, rate limit, request timeout.
pub fn build_router(state: AppState) -> Router {
    let request_timeout: Duration = state.request_timeout;

    Router::new()
        .route("/bets", get(handlers::list_bets).post(handlers::create_bet))
        .route("/bets/:id", get(handlers::get_bet))
        .route("/health", get(health_check_endpoints::health))
        .route("/ready", get(health_check_endpoints::readiness_probe))
        .route("/live", get(health_check_endpoints::liveness_probe))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE as usize))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout_error))
                .timeout(request_timeout),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(request_tracing))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
