//! Input validation for bet requests

use axum::{
    async_trait,
    body::{Bytes, HttpBody},
    extract::FromRequest,
    http::{header, HeaderMap, Request},
    BoxError,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    types::{
        CreateBetRequest, PaginationParams, MAX_AMOUNT, MAX_CRASH_POINT, MAX_USER_ID,
        MIN_AMOUNT, MIN_CRASH_POINT, MIN_USER_ID,
    },
};

/// Largest request body accepted, in bytes
pub const MAX_BODY_SIZE: u64 = 1 << 20;
pub const MAX_BET_ID_LENGTH: usize = 36;
pub const MAX_PAGE_LIMIT: u32 = 100;

lazy_static! {
    static ref UUID_REGEX: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    )
    .unwrap();
}

/// Field-ordered validation. The first failing field is reported.
pub trait ValidateOrdered {
    fn validate_ordered(&self) -> Result<(), AppError>;
}

impl ValidateOrdered for CreateBetRequest {
    fn validate_ordered(&self) -> Result<(), AppError> {
        let ranges = self.validate().err();
        let out_of_range = |field: &str| {
            ranges
                .as_ref()
                .map_or(false, |errors| errors.field_errors().contains_key(field))
        };

        if out_of_range("user_id") {
            return Err(AppError::validation(
                "user_id",
                format!("user_id must be between {} and {}", MIN_USER_ID, MAX_USER_ID),
            ));
        }

        check_bounded("amount", self.amount, MIN_AMOUNT, MAX_AMOUNT, out_of_range("amount"))?;
        check_bounded(
            "crash_point",
            self.crash_point,
            MIN_CRASH_POINT,
            MAX_CRASH_POINT,
            out_of_range("crash_point"),
        )?;

        Ok(())
    }
}

/// Finite check first, since range rules let NaN through
fn check_bounded(
    field: &str,
    value: f64,
    min: f64,
    max: f64,
    out_of_range: bool,
) -> Result<(), AppError> {
    if !value.is_finite() {
        return Err(AppError::validation(
            field,
            format!("{} must be a valid numeric value", field),
        ));
    }

    if !out_of_range {
        return Ok(());
    }

    let message = if value < min {
        format!("{} must be at least {:.2}", field, min)
    } else {
        format!("{} must not exceed {:.2}", field, max)
    };
    Err(AppError::validation(field, message))
}

/// Content type must be `application/json`; parameters are ignored
pub fn check_content_type(headers: &HeaderMap) -> Result<(), AppError> {
    let raw = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let media_type = raw.split(';').next().unwrap_or("").trim();

    if media_type != "application/json" {
        warn!(content_type = %raw, "invalid content type");
        return Err(AppError::validation(
            "content-type",
            "content type must be application/json",
        ));
    }

    Ok(())
}

/// Reject a declared body larger than `MAX_BODY_SIZE`
pub fn check_content_length(headers: &HeaderMap) -> Result<(), AppError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    if let Some(size) = declared {
        if size > MAX_BODY_SIZE {
            warn!(size, "request body too large");
            return Err(AppError::validation("body", "request body too large"));
        }
    }

    Ok(())
}

/// Bet id path parameter: non-empty, bounded, hyphenated UUID
pub fn validate_bet_id(id: &str) -> Result<Uuid, AppError> {
    if id.is_empty() {
        return Err(AppError::validation("id", "bet id is required"));
    }

    if id.len() > MAX_BET_ID_LENGTH {
        return Err(AppError::validation(
            "id",
            format!("bet id must not exceed {} characters", MAX_BET_ID_LENGTH),
        ));
    }

    if !UUID_REGEX.is_match(id) {
        return Err(AppError::validation("id", "bet id must be a valid UUID format"));
    }

    Uuid::parse_str(id).map_err(|_| AppError::validation("id", "bet id must be a valid UUID format"))
}

pub fn validate_pagination(pagination: &PaginationParams) -> Result<(), AppError> {
    if pagination.page < 1 {
        return Err(AppError::validation("page", "page must be at least 1"));
    }

    if pagination.limit < 1 {
        return Err(AppError::validation("limit", "limit must be at least 1"));
    }

    if pagination.limit > MAX_PAGE_LIMIT {
        return Err(AppError::validation(
            "limit",
            format!("limit must not exceed {}", MAX_PAGE_LIMIT),
        ));
    }

    Ok(())
}

/// Empty values fall back to the defaults and are accepted
pub fn validate_sort(sort_by: &str, order: &str) -> Result<(), AppError> {
    if !matches!(sort_by, "" | "amount" | "created_at") {
        return Err(AppError::validation(
            "sort_by",
            "sort_by must be either 'amount' or 'created_at'",
        ));
    }

    if !matches!(order, "" | "asc" | "desc") {
        return Err(AppError::validation(
            "order",
            "order must be either 'asc' or 'desc'",
        ));
    }

    Ok(())
}

/// JSON body extractor that checks the envelope, decodes and validates
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for ValidatedJson<T>
where
    T: DeserializeOwned + ValidateOrdered,
    S: Send + Sync,
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = AppError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        check_content_type(req.headers())?;
        check_content_length(req.headers())?;

        let body = Bytes::from_request(req, state).await.map_err(|e| {
            warn!(error = %e, "failed to read request body");
            AppError::validation("body", "invalid request body")
        })?;

        let value: T = serde_json::from_slice(&body).map_err(|e| {
            warn!(error = %e, "failed to decode request body");
            AppError::from(e)
        })?;

        value.validate_ordered()?;

        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn create(user_id: i64, amount: f64, crash_point: f64) -> CreateBetRequest {
        CreateBetRequest {
            user_id,
            amount,
            crash_point,
        }
    }

    fn failing_field(request: &CreateBetRequest) -> Option<String> {
        match request.validate_ordered() {
            Ok(()) => None,
            Err(AppError::Validation { field, .. }) => Some(field),
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_valid_create_request() {
        assert!(create(1, 1.0, 1.0).validate_ordered().is_ok());
        assert!(create(999_999_999, 100_000.0, 100.0).validate_ordered().is_ok());
        assert!(create(42, 250.5, 2.35).validate_ordered().is_ok());
    }

    #[test]
    fn test_create_request_bounds() {
        assert_eq!(failing_field(&create(0, 10.0, 2.0)).as_deref(), Some("user_id"));
        assert_eq!(failing_field(&create(1_000_000_000, 10.0, 2.0)).as_deref(), Some("user_id"));
        assert_eq!(failing_field(&create(1, 0.99, 2.0)).as_deref(), Some("amount"));
        assert_eq!(failing_field(&create(1, 100_000.01, 2.0)).as_deref(), Some("amount"));
        assert_eq!(failing_field(&create(1, 10.0, 0.5)).as_deref(), Some("crash_point"));
        assert_eq!(failing_field(&create(1, 10.0, 100.5)).as_deref(), Some("crash_point"));
    }

    #[test]
    fn test_first_failing_field_wins() {
        assert_eq!(failing_field(&create(0, 0.0, 0.0)).as_deref(), Some("user_id"));
        assert_eq!(failing_field(&create(5, 0.0, 0.0)).as_deref(), Some("amount"));
    }

    #[test]
    fn test_bound_messages() {
        let message = |request: CreateBetRequest| match request.validate_ordered() {
            Err(AppError::Validation { message, .. }) => message,
            other => panic!("unexpected result {:?}", other),
        };

        assert_eq!(message(create(0, 10.0, 2.0)), "user_id must be between 1 and 999999999");
        assert_eq!(message(create(1, 0.5, 2.0)), "amount must be at least 1.00");
        assert_eq!(message(create(1, 100_000.5, 2.0)), "amount must not exceed 100000.00");
        assert_eq!(message(create(1, 10.0, 0.99)), "crash_point must be at least 1.00");
        assert_eq!(message(create(1, 10.0, 101.0)), "crash_point must not exceed 100.00");
    }

    #[test]
    fn test_missing_fields_decode_as_zero() {
        let request: CreateBetRequest =
            serde_json::from_str(r#"{"amount": 10.0, "crash_point": 2.0}"#).unwrap();
        assert_eq!(request.user_id, 0);
        assert_eq!(failing_field(&request).as_deref(), Some("user_id"));
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        let err = create(1, f64::NAN, 2.0).validate_ordered().unwrap_err();
        assert_eq!(
            err,
            AppError::validation("amount", "amount must be a valid numeric value")
        );
        assert_eq!(failing_field(&create(1, 10.0, f64::INFINITY)).as_deref(), Some("crash_point"));
    }

    #[test]
    fn test_bet_id_rules() {
        let id = Uuid::new_v4();
        assert_eq!(validate_bet_id(&id.to_string()).unwrap(), id);
        assert_eq!(
            validate_bet_id(&id.to_string().to_uppercase()).unwrap(),
            id
        );

        assert!(validate_bet_id("").is_err());
        assert!(validate_bet_id("not-a-uuid").is_err());
        assert!(validate_bet_id(&format!("{}0", id)).is_err());
        assert!(validate_bet_id(&id.simple().to_string()).is_err());
    }

    #[test]
    fn test_pagination_rules() {
        assert!(validate_pagination(&PaginationParams { page: 1, limit: 1 }).is_ok());
        assert!(validate_pagination(&PaginationParams { page: 3, limit: 100 }).is_ok());
        assert!(validate_pagination(&PaginationParams { page: 0, limit: 10 }).is_err());
        assert!(validate_pagination(&PaginationParams { page: 1, limit: 0 }).is_err());
        assert!(validate_pagination(&PaginationParams { page: 1, limit: 101 }).is_err());
    }

    #[test]
    fn test_sort_rules() {
        assert!(validate_sort("", "").is_ok());
        assert!(validate_sort("amount", "asc").is_ok());
        assert!(validate_sort("created_at", "desc").is_ok());
        assert!(validate_sort("crash_point", "asc").is_err());
        assert!(validate_sort("amount", "up").is_err());
    }

    #[test]
    fn test_content_type_ignores_parameters() {
        let mut headers = HeaderMap::new();
        assert!(check_content_type(&headers).is_err());

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(check_content_type(&headers).is_err());

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(check_content_type(&headers).is_ok());
    }

    #[test]
    fn test_declared_body_size() {
        let mut headers = HeaderMap::new();
        assert!(check_content_length(&headers).is_ok());

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(MAX_BODY_SIZE));
        assert!(check_content_length(&headers).is_ok());

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(MAX_BODY_SIZE + 1));
        assert_eq!(
            check_content_length(&headers),
            Err(AppError::validation("body", "request body too large"))
        );
    }
}
