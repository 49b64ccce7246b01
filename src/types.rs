//! Type definitions for the API

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A recorded wager. Never modified after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Bet {
    pub id: Uuid,
    pub user_id: i64,
    pub amount: f64,
    pub crash_point: f64,
    pub created_at: DateTime<Utc>,
}

/// Optional predicates for listing; all set predicates must hold
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BetFilters {
    pub user_id: Option<i64>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    pub page: u32,
    pub limit: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// Sort key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Amount,
    #[default]
    CreatedAt,
}

impl SortField {
    /// Unknown keys sort by creation time
    pub fn from_str_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "amount" => SortField::Amount,
            _ => SortField::CreatedAt,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Amount => "amount",
            SortField::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Unknown directions sort descending
    pub fn from_str_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortParams {
    pub sort_by: SortField,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ListBetsRequest {
    pub filters: BetFilters,
    pub pagination: PaginationParams,
    pub sort: SortParams,
}

/// One page of matches. `total` counts every match, not just this page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListBetsResponse {
    pub bets: Vec<Bet>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

pub const MIN_USER_ID: i64 = 1;
pub const MAX_USER_ID: i64 = 999_999_999;
pub const MIN_AMOUNT: f64 = 1.0;
pub const MAX_AMOUNT: f64 = 100_000.0;
pub const MIN_CRASH_POINT: f64 = 1.0;
pub const MAX_CRASH_POINT: f64 = 100.0;

/// Create bet request body. Missing fields decode as zero and fail their range.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CreateBetRequest {
    #[validate(range(min = 1, max = 999999999))]
    pub user_id: i64,
    #[validate(range(min = 1.0, max = 100000.0))]
    pub amount: f64,
    #[validate(range(min = 1.0, max = 100.0))]
    pub crash_point: f64,
}

/// Bet as rendered on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetDto {
    pub id: String,
    pub user_id: i64,
    pub amount: f64,
    pub crash_point: f64,
    pub created_at: String,
}

impl From<&Bet> for BetDto {
    fn from(bet: &Bet) -> Self {
        Self {
            id: bet.id.to_string(),
            user_id: bet.user_id,
            amount: bet.amount,
            crash_point: bet.crash_point,
            created_at: bet.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListBetsResponseDto {
    pub bets: Vec<BetDto>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
}

impl From<&ListBetsResponse> for ListBetsResponseDto {
    fn from(response: &ListBetsResponse) -> Self {
        Self {
            bets: response.bets.iter().map(BetDto::from).collect(),
            total: response.total,
            page: response.page,
            limit: response.limit,
        }
    }
}
