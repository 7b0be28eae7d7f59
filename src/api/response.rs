use axum::extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection};
use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::ValidationErrors;

use crate::circulation::CirculationError;
use crate::storage::StoreError;
use crate::tokens::{PasswordError, TokenError};

// ============================================================================
// JSend status enum
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JSendStatus {
    Error,
    Fail,
    Success,
}

// ============================================================================
// JSend success envelope
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSend<T: Serialize> {
    pub data: T,
    pub status: JSendStatus,
}

impl<T: Serialize> JSend<T> {
    pub fn success(data: T) -> Json<JSend<T>> {
        Json(JSend {
            data,
            status: JSendStatus::Success,
        })
    }

    pub fn created(data: T) -> (StatusCode, Json<JSend<T>>) {
        (StatusCode::CREATED, Self::success(data))
    }
}

// ============================================================================
// JSend paginated envelope
// ============================================================================

#[derive(Debug, Serialize)]
pub struct JSendPaginated<T: Serialize> {
    pub data: PaginatedData<T>,
    pub status: JSendStatus,
}

#[derive(Debug, Serialize)]
pub struct PaginatedData<T: Serialize> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub total: u64,
}

impl<T: Serialize> JSendPaginated<T> {
    pub fn success(items: Vec<T>, pagination: Pagination) -> Json<JSendPaginated<T>> {
        Json(JSendPaginated {
            data: PaginatedData { items, pagination },
            status: JSendStatus::Success,
        })
    }
}

// ============================================================================
// JSend fail envelope (client errors, 4xx)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendFail {
    pub data: FailData,
    pub status: JSendStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailData {
    pub message: String,
}

impl JSendFail {
    pub fn response(
        status_code: StatusCode,
        message: impl Into<String>,
    ) -> (StatusCode, Json<JSendFail>) {
        (
            status_code,
            Json(JSendFail {
                data: FailData {
                    message: message.into(),
                },
                status: JSendStatus::Fail,
            }),
        )
    }
}

// ============================================================================
// JSend error envelope (server errors, 5xx)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JSendError {
    pub message: String,
    pub status: JSendStatus,
}

impl JSendError {
    pub fn response(
        status_code: StatusCode,
        message: impl Into<String>,
    ) -> (StatusCode, Json<JSendError>) {
        (
            status_code,
            Json(JSendError {
                message: message.into(),
                status: JSendStatus::Error,
            }),
        )
    }
}

// ============================================================================
// Unified error type for handlers
// ============================================================================

const INTERNAL_MESSAGE: &str = "Internal server error";

/// A JSend-compatible error that can be either a fail (4xx) or error (5xx).
/// Used as the error type in handler Result returns.
#[derive(Debug)]
pub enum ApiError {
    Fail(StatusCode, String),
    Error(StatusCode, String),
    /// 401 with a `WWW-Authenticate: Bearer` challenge
    Unauthenticated(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Fail(code, msg) => JSendFail::response(code, msg).into_response(),
            ApiError::Error(code, msg) => JSendError::response(code, msg).into_response(),
            ApiError::Unauthenticated(msg) => {
                let (status, json) = JSendFail::response(StatusCode::UNAUTHORIZED, msg);
                (status, [(header::WWW_AUTHENTICATE, "Bearer")], json).into_response()
            }
        }
    }
}

impl ApiError {
    /// Rejected by a business rule (duplicate key, book on loan, ...)
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::BAD_REQUEST, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::NOT_FOUND, message.into())
    }

    /// Request failed validation
    pub fn unprocessable(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::UNPROCESSABLE_ENTITY, message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    /// Logs `detail` and returns a generic 500; internals never reach clients.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "Request failed");
        ApiError::Error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Fail(code, _) | ApiError::Error(code, _) => *code,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::bad_request(msg),
            StoreError::Invalid(msg) => ApiError::unprocessable(msg),
            StoreError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            StoreError::Database(e) => ApiError::internal(e),
        }
    }
}

impl From<CirculationError> for ApiError {
    fn from(err: CirculationError) -> Self {
        if err.is_conflict() {
            return ApiError::bad_request(err.to_string());
        }
        match err {
            CirculationError::BookNotFound(_) | CirculationError::MemberNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            CirculationError::Database(e) => ApiError::internal(e),
            _ => ApiError::unprocessable(err.to_string()),
        }
    }
}

/// Field names only; the offending values are not echoed back.
impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_keys()
            .map(|field| field.to_string())
            .collect();
        fields.sort();
        ApiError::unprocessable(format!("Invalid value for: {}", fields.join(", ")))
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(_) | TokenError::SecretTooShort => ApiError::internal(err),
            TokenError::Expired | TokenError::InvalidSignature | TokenError::Malformed => {
                tracing::debug!(reason = %err, "Rejected bearer token");
                ApiError::unauthenticated("Could not validate credentials")
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::internal(err)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::internal(err)
    }
}

// ============================================================================
// Extractors whose rejections use the JSend envelope
// ============================================================================

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct AppForm<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::Fail(rejection.status(), rejection.body_text())
            }
            _ => ApiError::unprocessable(rejection.body_text()),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::unprocessable(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::unprocessable(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::unprocessable(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::{BookStatus, MemberStatus};
    use crate::storage::DatabaseError;

    #[test]
    fn test_store_error_status_mapping() {
        let conflict: ApiError = StoreError::Conflict("dup".into()).into();
        assert_eq!(conflict.status(), StatusCode::BAD_REQUEST);

        let missing: ApiError = StoreError::NotFound("Book").into();
        assert!(matches!(missing, ApiError::Fail(StatusCode::NOT_FOUND, ref m) if m == "Book not found"));

        let invalid: ApiError = StoreError::Invalid("bad".into()).into();
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_database_detail_is_hidden() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err: ApiError = StoreError::Database(DatabaseError::Io(io)).into();
        match err {
            ApiError::Error(code, msg) => {
                assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(!msg.contains("disk"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_circulation_error_status_mapping() {
        let cases = [
            (CirculationError::BookNotFound(1), StatusCode::NOT_FOUND),
            (CirculationError::MemberNotFound(1), StatusCode::NOT_FOUND),
            (
                CirculationError::NoActiveLoan {
                    book_id: 1,
                    member_id: 1,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                CirculationError::BookUnavailable {
                    book_id: 1,
                    status: BookStatus::Borrowed,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                CirculationError::MemberInactive {
                    member_id: 1,
                    status: MemberStatus::Expired,
                },
                StatusCode::BAD_REQUEST,
            ),
            (CirculationError::InvalidLoanPeriod(0), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_unauthenticated_carries_challenge() {
        let response = ApiError::from(TokenError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn test_validation_errors_name_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("title", validator::ValidationError::new("length"));
        errors.add("email", validator::ValidationError::new("email"));

        match ApiError::from(errors) {
            ApiError::Fail(code, msg) => {
                assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(msg, "Invalid value for: email, title");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
