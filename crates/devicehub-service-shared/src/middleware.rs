//! HTTP middleware for devicehub services.
//!
//! This module provides:
//! - [`log_requests`]: one structured record per exchange, with both bodies
//! - [`RecoveryLayer`]: turns handler panics into bare 500 responses
//! - [`cors_layer`]: cross-origin policy from an origin allow-list
//! - [`with_middleware`]: applies the full chain to a router
//!
//! # Chain order
//!
//! Outermost first: request context, CORS, logging, recovery, handler. The
//! logging wrapper therefore sees the 500 produced by recovery.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::Cell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{ready, Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method, Response, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::Router;
use http_body::{Frame, SizeHint};
use pin_project_lite::pin_project;
use serde::de::IgnoredAny;
use tower::{Layer, Service, ServiceBuilder};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::context::{request_context_middleware, RequestContext};
use crate::decode::read_body;
use crate::transport::Transport;

// =============================================================================
// Request logging
// =============================================================================

/// Log every exchange once its response body has been sent.
///
/// The request body is buffered under the request's `DefaultBodyLimit` and
/// handed on unchanged; the response body is wrapped in a [`CaptureBody`] that
/// copies frames as they pass. The record is written when the response body
/// ends, or when it is dropped early.
///
/// A body that cannot be read (or is over the limit) never reaches the handler:
/// the failure is answered through [`Transport::error_response`] and logged
/// like any other exchange.
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn log_requests(
    State(transport): State<Transport>,
    request: Request,
    next: Next,
) -> axum::response::Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let context = request.extensions().get::<RequestContext>().cloned();

    let record = ExchangeRecord {
        start,
        method,
        url: uri.to_string(),
        path: uri.path().to_string(),
        status: StatusCode::OK,
        request: String::new(),
    };

    let (parts, bytes) = match read_body(request).await {
        Ok(read) => read,
        Err(err) => {
            tracing::warn!(error = %err, url = %record.url, "could not read request body");
            let response = transport.error_response(context.as_ref(), &err);
            return capture(response, record);
        }
    };

    let record = ExchangeRecord {
        request: compact_json(&bytes),
        ..record
    };

    let response = next
        .run(Request::from_parts(parts, Body::from(bytes)))
        .await;
    capture(response, record)
}

fn capture(response: axum::response::Response, record: ExchangeRecord) -> axum::response::Response {
    let (parts, body) = response.into_parts();
    let record = ExchangeRecord {
        status: parts.status,
        ..record
    };
    Response::from_parts(parts, Body::new(CaptureBody::new(body, record)))
}

/// Everything about an exchange except the response body.
#[derive(Debug)]
struct ExchangeRecord {
    start: Instant,
    method: Method,
    url: String,
    path: String,
    status: StatusCode,
    request: String,
}

impl ExchangeRecord {
    fn emit(self, response_body: &[u8]) {
        let duration_ns = u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        let response = compact_json(response_body);
        let status_code = self.status.as_u16();

        if status_code >= 400 {
            tracing::error!(
                "type" = "inbound",
                transport = "http",
                method = %self.method,
                url = %self.url,
                path = %self.path,
                status_code,
                duration_ns,
                request = %self.request,
                response = %response,
                "error processing request"
            );
        } else {
            tracing::info!(
                "type" = "inbound",
                transport = "http",
                method = %self.method,
                url = %self.url,
                path = %self.path,
                status_code,
                duration_ns,
                request = %self.request,
                response = %response,
                "successfully processing request"
            );
        }
    }
}

pin_project! {
    /// Pass-through response body that keeps a copy of every data frame.
    pub struct CaptureBody<B> {
        #[pin]
        inner: B,
        captured: Vec<u8>,
        record: Option<ExchangeRecord>,
    }

    impl<B> PinnedDrop for CaptureBody<B> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(record) = this.record.take() {
                record.emit(this.captured);
            }
        }
    }
}

impl<B> CaptureBody<B> {
    fn new(inner: B, record: ExchangeRecord) -> Self {
        Self {
            inner,
            captured: Vec::new(),
            record: Some(record),
        }
    }
}

impl<B> http_body::Body for CaptureBody<B>
where
    B: http_body::Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let polled = ready!(this.inner.poll_frame(cx));

        match &polled {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.captured.extend_from_slice(data);
                }
            }
            Some(Err(_)) => {}
            None => {
                if let Some(record) = this.record.take() {
                    record.emit(this.captured);
                }
            }
        }

        Poll::Ready(polled)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Strip insignificant whitespace from a JSON document, keeping key order.
///
/// Input that is not valid JSON is returned as (lossy) UTF-8 text.
pub fn compact_json(raw: &[u8]) -> String {
    if serde_json::from_slice::<IgnoredAny>(raw).is_err() {
        return String::from_utf8_lossy(raw).into_owned();
    }

    let text = String::from_utf8_lossy(raw);
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if !c.is_ascii_whitespace() {
            out.push(c);
        }
    }
    out
}

// =============================================================================
// Panic recovery
// =============================================================================

/// Panic payload that [`RecoveryLayer`] lets through untouched.
///
/// Raise it with [`abort_handler`] to abandon a request without producing a
/// response; the server's own task isolation takes over from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortHandler;

/// Abort the current handler. See [`AbortHandler`].
pub fn abort_handler() -> ! {
    panic::panic_any(AbortHandler)
}

thread_local! {
    static LAST_BACKTRACE: Cell<Option<String>> = const { Cell::new(None) };
}

static BACKTRACE_HOOK: Once = Once::new();

/// Record a backtrace for every panic on the panicking thread, then defer to
/// the previously installed hook. [`AbortHandler`] panics are silent.
fn install_backtrace_hook() {
    BACKTRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if info.payload().is::<AbortHandler>() {
                return;
            }
            LAST_BACKTRACE.with(|slot| slot.set(Some(Backtrace::force_capture().to_string())));
            previous(info);
        }));
    });
}

/// Tower layer that converts panics in the inner service into 500 responses.
#[derive(Debug, Clone, Default)]
pub struct RecoveryLayer;

impl RecoveryLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RecoveryLayer {
    type Service = Recovery<S>;

    fn layer(&self, inner: S) -> Self::Service {
        install_backtrace_hook();
        Recovery { inner }
    }
}

/// Service produced by [`RecoveryLayer`].
#[derive(Debug, Clone)]
pub struct Recovery<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for Recovery<S>
where
    S: Service<http::Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: Default,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = RecoveryFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let state = match panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(req))) {
            Ok(future) => RecoveryState::Running { future },
            Err(payload) if payload.is::<AbortHandler>() => panic::resume_unwind(payload),
            Err(payload) => RecoveryState::Panicked {
                payload: Some(payload),
            },
        };
        RecoveryFuture { state }
    }
}

pin_project! {
    /// Response future for [`Recovery`].
    pub struct RecoveryFuture<F> {
        #[pin]
        state: RecoveryState<F>,
    }
}

pin_project! {
    #[project = RecoveryStateProj]
    enum RecoveryState<F> {
        Running {
            #[pin]
            future: F,
        },
        Panicked {
            payload: Option<Box<dyn Any + Send + 'static>>,
        },
    }
}

impl<F, ResBody, E> Future for RecoveryFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
    ResBody: Default,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().state.project() {
            RecoveryStateProj::Running { future } => {
                match panic::catch_unwind(AssertUnwindSafe(|| future.poll(cx))) {
                    Ok(poll) => poll,
                    Err(payload) => Poll::Ready(Ok(recover(Some(payload)))),
                }
            }
            RecoveryStateProj::Panicked { payload } => Poll::Ready(Ok(recover(payload.take()))),
        }
    }
}

fn recover<B: Default>(payload: Option<Box<dyn Any + Send + 'static>>) -> Response<B> {
    let message = match payload {
        Some(payload) if payload.is::<AbortHandler>() => panic::resume_unwind(payload),
        Some(payload) => panic_message(payload.as_ref()),
        None => "panic payload already consumed".to_string(),
    };
    let stack_trace = LAST_BACKTRACE
        .take()
        .unwrap_or_else(|| Backtrace::force_capture().to_string());

    tracing::error!(error = %message, stack_trace = %stack_trace, "panic occurred");

    let mut response = Response::new(B::default());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// =============================================================================
// CORS and composition
// =============================================================================

/// Methods cross-origin callers may use.
pub const CORS_ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PATCH,
    Method::PUT,
    Method::OPTIONS,
    Method::DELETE,
];

/// CORS policy for `allowed_origins`. A `*` entry allows any origin.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = if allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|err| tracing::warn!(origin = %origin, error = %err, "ignoring invalid CORS origin"))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_ALLOWED_METHODS)
        .allow_headers([
            header::AUTHORIZATION,
            header::ORIGIN,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-timestamp"),
            HeaderName::from_static("x-transaction-id"),
        ])
}

/// Wrap every route of `router` in the middleware chain.
///
/// Request bodies are limited to [`Transport::max_body_bytes`] for the whole
/// chain, handler extractors included.
pub fn with_middleware<S>(router: Router<S>, transport: Transport, allowed_origins: &[String]) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(DefaultBodyLimit::max(transport.max_body_bytes()))
            .layer(from_fn_with_state(transport.clone(), request_context_middleware))
            .layer(cors_layer(allowed_origins))
            .layer(from_fn_with_state(transport, log_requests))
            .layer(RecoveryLayer::new()),
    )
}
