//! Error responses.
//!
//! Every failure leaves the API as
//! `{ "success": false, "error": { "key", "message", "errors"? } }` where
//! `key` is stable so clients can localize independently of `message`.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use beacon_state::{FieldError, StateError};

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub key: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: ErrorDetail,
}

impl ApiError {
    pub fn new(status: StatusCode, key: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            detail: ErrorDetail {
                key,
                message: message.into(),
                errors: Vec::new(),
            },
        }
    }
}

impl From<StateError> for ApiError {
    fn from(e: StateError) -> Self {
        let status = match &e {
            StateError::ServiceNotFound(_) | StateError::IncidentNotFound(_) => StatusCode::NOT_FOUND,
            StateError::Validation(_) => StatusCode::BAD_REQUEST,
            StateError::IncidentResolved(_) => StatusCode::CONFLICT,
            _ => {
                error!(error = %e, "store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let mut err = ApiError::new(status, e.key(), e.to_string());
        if let StateError::Validation(errors) = e {
            err.detail.errors = errors;
        }
        err
    }
}

// Malformed payloads share the validation error shape.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        rejected_payload(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        rejected_payload(rejection.body_text())
    }
}

fn rejected_payload(message: String) -> ApiError {
    let field = field_error(&message);
    let mut err = ApiError::new(StatusCode::BAD_REQUEST, "validation_failed", message);
    err.detail.errors.extend(field);
    err
}

/// Recover the offending field from a deserializer message.
///
/// A missing field is `required`. A data error reported against a path,
/// such as `status: unknown variant ...`, is `invalid`.
fn field_error(message: &str) -> Option<FieldError> {
    if let Some((_, rest)) = message.split_once("missing field `") {
        let field = rest.split('`').next()?;
        return Some(FieldError::new(field, "required"));
    }
    // Strip the extractor's own prefix, then look for `<path>: <reason>`.
    let (_, detail) = message.split_once(": ")?;
    let (path, _) = detail.split_once(": ")?;
    let is_path = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    is_path.then(|| FieldError::new(path, "invalid"))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Body {
            success: bool,
            error: ErrorDetail,
        }

        (
            self.status,
            Json(Body {
                success: false,
                error: self.detail,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (StateError::ServiceNotFound("api".into()), StatusCode::NOT_FOUND),
            (StateError::IncidentNotFound("inc-1".into()), StatusCode::NOT_FOUND),
            (StateError::Validation(vec![]), StatusCode::BAD_REQUEST),
            (StateError::IncidentResolved("inc-1".into()), StatusCode::CONFLICT),
            (StateError::Read("io".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn validation_errors_are_listed() {
        let err = ApiError::from(StateError::Validation(vec![FieldError::new("title", "required")]));
        let body = serde_json::to_value(&err.detail).unwrap();
        assert_eq!(body["key"], "validation_failed");
        assert_eq!(body["errors"][0]["field"], "title");
        assert_eq!(body["errors"][0]["key"], "required");
    }

    #[test]
    fn missing_field_is_required() {
        let err = rejected_payload(
            "Failed to deserialize the JSON body into the target type: missing field `message` at line 1 column 30"
                .to_string(),
        );
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail.key, "validation_failed");
        assert_eq!(err.detail.errors, vec![FieldError::new("message", "required")]);
    }

    #[test]
    fn bad_value_names_its_field() {
        let err = rejected_payload(
            "Failed to deserialize the JSON body into the target type: status: unknown variant `bogus`, expected one of `investigating`, `identified` at line 1 column 20"
                .to_string(),
        );
        assert_eq!(err.detail.errors, vec![FieldError::new("status", "invalid")]);
    }

    #[test]
    fn syntax_error_has_no_field() {
        let err = rejected_payload(
            "Failed to parse the request body as JSON: EOF while parsing an object at line 1 column 1"
                .to_string(),
        );
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.detail.key, "validation_failed");
        assert!(err.detail.errors.is_empty());
    }

    #[test]
    fn errors_omitted_when_empty() {
        let err = ApiError::from(StateError::ServiceNotFound("api".into()));
        let body = serde_json::to_value(&err.detail).unwrap();
        assert_eq!(body["key"], "service_not_found");
        assert!(body.get("errors").is_none());
    }
}
