//! Shared HTTP transport pipeline for devicehub microservices.
//!
//! This crate turns raw HTTP exchanges into typed calls and back:
//!
//! - [`decode_request`] and the [`Bind`] hook: body to typed request
//! - [`response_with_body`], [`created_response`], [`no_content_response`]:
//!   typed result to response
//! - [`Transport`]: localized error responses and the handler adapter
//!   ([`Transport::make_handler`])
//! - [`middleware`]: request logging, panic recovery, CORS, and
//!   [`with_middleware`] to apply them in order
//! - [`RequestContext`]: per-request language and correlation ID
//! - [`ServiceConfig`] and [`logging`]: startup configuration
//!
//! # Architecture
//!
//! Endpoints stay thin; localization and error classification live in
//! `devicehub-lib`. A request flows through:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  context → CORS → logging → recovery                        │
//! │    └─ handler: decode → Bind → endpoint → encode            │
//! │         └─ any failure → Transport::error_response          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides a transport over the shipped catalogs
//! and a log capture sink. Enable the `test-utils` feature to access it from
//! dependent crates.

#![deny(warnings)]

pub mod config;
mod context;
mod decode;
mod encode;
mod health;
pub mod logging;
pub mod middleware;
mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{HttpConfig, LocaleConfig, ServiceConfig, DEFAULT_PORT};
pub use context::{
    extract_or_generate_request_id, request_context_middleware, RequestContext, RequestId,
    X_REQUEST_ID,
};
pub use decode::{decode_request, Bind, DecodeError, RawRequest};
pub use encode::{
    created_response, no_content_response, response_with_body, EncodeError, ErrorResponse,
    CONTENT_TYPE_JSON,
};
pub use health::{health_live, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use middleware::{
    abort_handler, compact_json, cors_layer, log_requests, with_middleware, AbortHandler,
    CaptureBody, Recovery, RecoveryFuture, RecoveryLayer,
};
pub use transport::{HandlerFuture, Transport, DEFAULT_MAX_BODY_BYTES};
