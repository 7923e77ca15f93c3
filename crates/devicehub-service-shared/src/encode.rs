//! Response encoders.
//!
//! Success encoders are plain functions from a result value to a response so
//! they can be handed to [`Transport::make_handler`](crate::Transport::make_handler).
//! The error path lives on [`Transport`](crate::Transport) because it needs the
//! localizer.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content type of every JSON body this crate writes.
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// Body written for every failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Localized message.
    pub error: String,
    #[serde(rename = "uiCode")]
    pub ui_code: String,
}

/// Failure to produce a success response.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize response body: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 200 with `value` as the JSON body.
pub fn response_with_body<T: Serialize>(value: T) -> Result<Response, EncodeError> {
    let bytes = serde_json::to_vec(&value)?;
    Ok(json_response(StatusCode::OK, bytes))
}

/// 201 without a body.
pub fn created_response<T>(_value: T) -> Result<Response, EncodeError> {
    Ok(status_response(StatusCode::CREATED))
}

/// 204 without a body.
pub fn no_content_response<T>(_value: T) -> Result<Response, EncodeError> {
    Ok(status_response(StatusCode::NO_CONTENT))
}

pub(crate) fn json_response(status: StatusCode, bytes: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(CONTENT_TYPE_JSON),
    );
    response
}

pub(crate) fn status_response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

/// Encode `body` with `status`. The status stands even if serialization
/// fails; the body is then left empty.
pub(crate) fn error_body_response(status: StatusCode, body: &ErrorResponse) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => json_response(status, bytes),
        Err(err) => {
            tracing::error!(error = %err, status = status.as_u16(), "failed to encode error response");
            let mut response = status_response(status);
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(CONTENT_TYPE_JSON),
            );
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde::ser::Error as _;

    #[derive(Serialize)]
    struct Device {
        name: String,
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("not today"))
        }
    }

    #[tokio::test]
    async fn test_response_with_body_writes_json() {
        let response = response_with_body(Device {
            name: "sensor".to_string(),
        })
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            CONTENT_TYPE_JSON
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"name":"sensor"}"#);
    }

    #[test]
    fn test_response_with_body_reports_serialization_failure() {
        let err = response_with_body(Unserializable).unwrap_err();
        assert!(err.to_string().contains("not today"));
    }

    #[tokio::test]
    async fn test_created_and_no_content_have_no_body() {
        let created = created_response(()).unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        assert!(to_bytes(created.into_body(), usize::MAX)
            .await
            .unwrap()
            .is_empty());

        let no_content = no_content_response("ignored").unwrap();
        assert_eq!(no_content.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_error_response_field_names() {
        let body = ErrorResponse {
            error: "Device record not found!".to_string(),
            ui_code: "DEVICE_NOT_FOUND".to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(
            json,
            r#"{"error":"Device record not found!","uiCode":"DEVICE_NOT_FOUND"}"#
        );
    }

    #[tokio::test]
    async fn test_error_body_response_keeps_status() {
        let body = ErrorResponse {
            error: "nope".to_string(),
            ui_code: String::new(),
        };
        let response = error_body_response(StatusCode::CONFLICT, &body);
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let decoded: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, body);
    }
}
