//! Query engine: filter, sort and paginate a candidate set of bets
//!
//! These functions are pure. The ledger hands them the candidates it
//! collected under its read lock and returns whatever they produce.

use std::cmp::Ordering;

use crate::types::{
    Bet, BetFilters, ListBetsRequest, ListBetsResponse, PaginationParams, SortField, SortOrder,
    SortParams,
};

const DEFAULT_LIMIT: u32 = 10;

/// True when every set filter holds for `bet`
pub fn matches(bet: &Bet, filters: &BetFilters) -> bool {
    if let Some(user_id) = filters.user_id {
        if bet.user_id != user_id {
            return false;
        }
    }

    if let Some(min) = filters.min_amount {
        if bet.amount < min {
            return false;
        }
    }

    if let Some(max) = filters.max_amount {
        if bet.amount > max {
            return false;
        }
    }

    true
}

fn compare_by(a: &Bet, b: &Bet, field: SortField) -> Ordering {
    match field {
        SortField::Amount => a.amount.total_cmp(&b.amount),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

/// Stable sort on one key.
///
/// Bets that compare equal keep their input order. When the input came from
/// a hash map traversal that order is arbitrary, so ties are unordered.
pub fn sort_bets(bets: &mut [Bet], sort: &SortParams) {
    match sort.order {
        SortOrder::Asc => bets.sort_by(|a, b| compare_by(a, b, sort.sort_by)),
        SortOrder::Desc => bets.sort_by(|a, b| compare_by(b, a, sort.sort_by)),
    }
}

/// Index range of a 1-based page, clipped to `len`
pub fn page_bounds(len: usize, pagination: &PaginationParams) -> (usize, usize) {
    let page = pagination.page.max(1) as usize;
    let limit = if pagination.limit == 0 {
        DEFAULT_LIMIT
    } else {
        pagination.limit
    } as usize;

    let start = (page - 1).saturating_mul(limit);
    if start >= len {
        return (len, len);
    }

    (start, start.saturating_add(limit).min(len))
}

pub fn paginate(mut bets: Vec<Bet>, pagination: &PaginationParams) -> Vec<Bet> {
    let (start, end) = page_bounds(bets.len(), pagination);
    bets.truncate(end);
    bets.drain(..start);
    bets
}

/// Run a full listing over `candidates`
pub fn execute<'a, I>(candidates: I, request: &ListBetsRequest) -> ListBetsResponse
where
    I: IntoIterator<Item = &'a Bet>,
{
    let mut matched: Vec<Bet> = candidates
        .into_iter()
        .filter(|bet| matches(bet, &request.filters))
        .cloned()
        .collect();

    sort_bets(&mut matched, &request.sort);

    let total = matched.len();
    let bets = paginate(matched, &request.pagination);

    ListBetsResponse {
        bets,
        total,
        page: request.pagination.page,
        limit: request.pagination.limit,
    }
}
