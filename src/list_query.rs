//! Lenient parsing of `GET /bets` query parameters
//!
//! Invalid values never fail the request here; they fall back to the
//! default or to "absent".

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::types::{
    BetFilters, ListBetsRequest, PaginationParams, SortField, SortOrder, SortParams,
};

const MAX_PAGE: u32 = 10000;
const MAX_LIMIT: u32 = 100;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r#"[<>"'%;)(&+]"#).unwrap();
}

/// Trim and strip characters that have no business in these parameters
pub fn sanitize(value: &str) -> String {
    UNSAFE_CHARS.replace_all(value.trim(), "").into_owned()
}

fn param(query: &HashMap<String, String>, key: &str) -> Option<String> {
    query
        .get(key)
        .filter(|v| !v.is_empty())
        .map(|v| sanitize(v))
}

fn bounded(query: &HashMap<String, String>, key: &str, max: u32, default: u32) -> u32 {
    param(query, key)
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|n| (1..=max).contains(n))
        .unwrap_or(default)
}

fn finite(query: &HashMap<String, String>, key: &str) -> Option<f64> {
    param(query, key)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

pub fn parse_list_request(query: &HashMap<String, String>) -> ListBetsRequest {
    let defaults = PaginationParams::default();
    let pagination = PaginationParams {
        page: bounded(query, "page", MAX_PAGE, defaults.page),
        limit: bounded(query, "limit", MAX_LIMIT, defaults.limit),
    };

    let filters = BetFilters {
        user_id: param(query, "user_id").and_then(|v| v.parse::<i64>().ok()),
        min_amount: finite(query, "min_amount"),
        max_amount: finite(query, "max_amount"),
    };

    let sort = SortParams {
        sort_by: param(query, "sort_by")
            .map(|v| SortField::from_str_lenient(&v))
            .unwrap_or_default(),
        order: param(query, "order")
            .map(|v| SortOrder::from_str_lenient(&v))
            .unwrap_or_default(),
    };

    ListBetsRequest {
        filters,
        pagination,
        sort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_for_empty_query() {
        let request = parse_list_request(&HashMap::new());
        assert_eq!(request, ListBetsRequest::default());
        assert_eq!(request.pagination, PaginationParams { page: 1, limit: 10 });
        assert_eq!(request.sort.sort_by, SortField::CreatedAt);
        assert_eq!(request.sort.order, SortOrder::Desc);
    }

    #[test]
    fn test_parses_all_parameters() {
        let request = parse_list_request(&query(&[
            ("page", "3"),
            ("limit", "25"),
            ("user_id", "77"),
            ("min_amount", "10.5"),
            ("max_amount", "500"),
            ("sort_by", "amount"),
            ("order", "ASC"),
        ]));

        assert_eq!(request.pagination, PaginationParams { page: 3, limit: 25 });
        assert_eq!(
            request.filters,
            BetFilters {
                user_id: Some(77),
                min_amount: Some(10.5),
                max_amount: Some(500.0),
            }
        );
        assert_eq!(request.sort.sort_by, SortField::Amount);
        assert_eq!(request.sort.order, SortOrder::Asc);
    }

    #[test]
    fn test_out_of_range_pagination_falls_back() {
        let request = parse_list_request(&query(&[("page", "0"), ("limit", "101")]));
        assert_eq!(request.pagination, PaginationParams { page: 1, limit: 10 });

        let request = parse_list_request(&query(&[("page", "10001"), ("limit", "-5")]));
        assert_eq!(request.pagination, PaginationParams { page: 1, limit: 10 });

        let request = parse_list_request(&query(&[("page", "10000"), ("limit", "100")]));
        assert_eq!(request.pagination, PaginationParams { page: 10000, limit: 100 });
    }

    #[test]
    fn test_garbage_filters_are_dropped() {
        let request = parse_list_request(&query(&[
            ("user_id", "abc"),
            ("min_amount", "NaN"),
            ("max_amount", "inf"),
        ]));
        assert_eq!(request.filters, BetFilters::default());
    }

    #[test]
    fn test_unsafe_characters_are_stripped() {
        assert_eq!(sanitize("  <5>  "), "5");
        assert_eq!(sanitize("1'; drop"), "1 drop");

        let request = parse_list_request(&query(&[
            ("page", " 2; "),
            ("user_id", "(42)"),
            ("sort_by", "\"amount\""),
        ]));
        assert_eq!(request.pagination.page, 2);
        assert_eq!(request.filters.user_id, Some(42));
        assert_eq!(request.sort.sort_by, SortField::Amount);
    }

    #[test]
    fn test_unknown_sort_values_use_defaults() {
        let request = parse_list_request(&query(&[("sort_by", "crash_point"), ("order", "sideways")]));
        assert_eq!(request.sort, SortParams::default());
    }
}
