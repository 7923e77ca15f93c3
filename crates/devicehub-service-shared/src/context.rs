//! Request-scoped context.
//!
//! [`request_context_middleware`] builds a [`RequestContext`] from the inbound
//! headers and stores it in the request extensions, where the handler adapter
//! picks it up and passes it to the endpoint by value.
//!
//! # Request ID Propagation
//!
//! The `X-Request-ID` header is used if present, otherwise a new UUID v7
//! (time-sortable) is generated. The ID is recorded on the request span and
//! echoed on the response.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use devicehub_lib::{ApplicationError, ErrorKind, Localizable, UI_INVALID_ACCEPT_LANGUAGE};

use crate::transport::Transport;

/// Header carrying the correlation ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Newtype wrapper for request correlation IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Create a new request ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new UUID v7 request ID.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the request ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Extract the request ID from headers or generate a new UUID v7.
pub fn extract_or_generate_request_id(headers: &HeaderMap) -> RequestId {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(RequestId::from)
        .unwrap_or_else(RequestId::generate)
}

/// Per-request values the endpoint may depend on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Raw `Accept-Language` value. Empty when the header is absent.
    pub language: String,
    pub request_id: RequestId,
}

impl RequestContext {
    pub fn new(language: impl Into<String>, request_id: RequestId) -> Self {
        Self {
            language: language.into(),
            request_id,
        }
    }

    /// Build the context from request headers.
    ///
    /// Fails with a bad-request error when `Accept-Language` holds anything
    /// other than visible ASCII.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApplicationError> {
        let language = match headers.get(header::ACCEPT_LANGUAGE) {
            Some(value) => value.to_str().map_err(|err| {
                ApplicationError::new(
                    ErrorKind::BadRequest,
                    Localizable::new("errors.invalid_accept_language", "invalid accept language"),
                )
                .with_ui_code(UI_INVALID_ACCEPT_LANGUAGE)
                .with_cause(err)
            })?,
            None => "",
        };

        Ok(Self::new(
            language.trim(),
            extract_or_generate_request_id(headers),
        ))
    }
}

/// Attach a [`RequestContext`] to the request.
///
/// Use with `axum::middleware::from_fn_with_state`. Invalid headers are
/// answered through [`Transport::error_response`] without reaching the
/// handler.
pub async fn request_context_middleware(
    State(transport): State<Transport>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = match RequestContext::from_headers(request.headers()) {
        Ok(context) => context,
        Err(err) => {
            tracing::debug!(error = %err, "rejecting request with invalid context headers");
            return transport.error_response(None, &err);
        }
    };

    let request_id = context.request_id.clone();
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    request.extensions_mut().insert(context);

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_transport;
    use axum::body::{to_bytes, Body};
    use axum::http::StatusCode;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::{Extension, Router};
    use tower::ServiceExt;

    #[test]
    fn test_request_id_generate() {
        let id1 = RequestId::generate();
        let id2 = RequestId::generate();

        assert_ne!(id1, id2);
        assert_eq!(id1.as_str().len(), 36);
        assert!(id1.as_str().contains('-'));
    }

    #[test]
    fn test_extract_request_id_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Request-ID", HeaderValue::from_static("test-123"));
        assert_eq!(extract_or_generate_request_id(&headers).as_str(), "test-123");
    }

    #[test]
    fn test_extract_request_id_generates_when_empty() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static(""));
        assert_eq!(extract_or_generate_request_id(&headers).as_str().len(), 36);
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("es-MX,es;q=0.9"));
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));

        let context = RequestContext::from_headers(&headers).unwrap();
        assert_eq!(context.language, "es-MX,es;q=0.9");
        assert_eq!(context.request_id, RequestId::new("req-1"));
    }

    #[test]
    fn test_missing_accept_language_is_empty() {
        let context = RequestContext::from_headers(&HeaderMap::new()).unwrap();
        assert!(context.language.is_empty());
    }

    #[test]
    fn test_non_ascii_accept_language_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_bytes("español".as_bytes()).unwrap(),
        );

        let err = RequestContext::from_headers(&headers).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadRequest);
        assert_eq!(err.ui_code, UI_INVALID_ACCEPT_LANGUAGE);
        assert!(err.cause().is_some());
    }

    async fn echo_language(Extension(context): Extension<RequestContext>) -> String {
        context.language
    }

    fn app() -> Router {
        let transport = test_transport();
        Router::new()
            .route("/", get(echo_language))
            .layer(from_fn_with_state(transport, request_context_middleware))
    }

    #[tokio::test]
    async fn test_middleware_inserts_context_and_echoes_request_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(header::ACCEPT_LANGUAGE, "es")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(&X_REQUEST_ID).unwrap(), "req-42");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"es");
    }

    #[tokio::test]
    async fn test_middleware_rejects_invalid_accept_language() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(
                        header::ACCEPT_LANGUAGE,
                        HeaderValue::from_bytes(&[0xe9, b's']).unwrap(),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["uiCode"], UI_INVALID_ACCEPT_LANGUAGE);
        assert_eq!(json["error"], "Invalid Accept-Language header!");
    }
}
