//! Bet endpoint handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::collections::HashMap;
use tracing::info;

use crate::{
    context::OpContext,
    error::Result,
    list_query::parse_list_request,
    tracing_middleware::RequestId,
    types::{BetDto, CreateBetRequest, ListBetsResponseDto},
    validation::{validate_bet_id, validate_pagination, validate_sort, ValidatedJson},
    AppState,
};

/// Record a new bet
pub async fn create_bet(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    ValidatedJson(request): ValidatedJson<CreateBetRequest>,
) -> Result<(StatusCode, Json<BetDto>)> {
    let ctx = OpContext::with_timeout(state.request_timeout);
    let bet = state
        .bets
        .create(&ctx, request.user_id, request.amount, request.crash_point)
        .await?;

    info!(
        request_id = %request_id.map(|Extension(id)| id.0).unwrap_or_default(),
        bet_id = %bet.id,
        user_id = bet.user_id,
        amount = bet.amount,
        crash_point = bet.crash_point,
        "bet created"
    );

    Ok((StatusCode::CREATED, Json(BetDto::from(&bet))))
}

/// Fetch one bet by id
pub async fn get_bet(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BetDto>> {
    let id = validate_bet_id(&id)?;

    let ctx = OpContext::with_timeout(state.request_timeout);
    let bet = state.bets.get_by_id(&ctx, id).await?;

    Ok(Json(BetDto::from(&bet)))
}

/// List bets with filters, sorting and pagination
pub async fn list_bets(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListBetsResponseDto>> {
    let request = parse_list_request(&params);

    validate_pagination(&request.pagination)?;
    validate_sort(request.sort.sort_by.as_str(), request.sort.order.as_str())?;

    let ctx = OpContext::with_timeout(state.request_timeout);
    let response = state.bets.list(&ctx, &request).await?;

    Ok(Json(ListBetsResponseDto::from(&response)))
}
