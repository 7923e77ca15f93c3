//! Request decoding.
//!
//! [`decode_request`] reads the body, deserializes it according to the
//! `Content-Type` header and then runs the target type's [`Bind`] hook:
//!
//! - `application/x-www-form-urlencoded` bodies are decoded as forms
//! - anything else is decoded as JSON
//! - an empty or whitespace-only body yields `T::default()`
//!
//! Bodies are read under axum's `DefaultBodyLimit` (2 MiB unless a
//! `DefaultBodyLimit` layer says otherwise). Larger bodies fail with a
//! 413-classified [`DecodeError::TooLarge`].

use std::collections::HashMap;
use std::error::Error as StdError;

use axum::body::{to_bytes, Bytes};
use axum::extract::{FromRequestParts, Query, RawPathParams, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method, Uri};
use axum::RequestExt;
use http_body_util::LengthLimitError;
use serde::de::DeserializeOwned;
use thiserror::Error;

use devicehub_lib::{
    invalid_request, ApplicationError, BoxError, ERR_PAYLOAD_TOO_LARGE, UI_INVALID_REQUEST_BODY,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Validation and normalization run on a freshly decoded value.
///
/// Implementations typically pull path or query parameters into the value,
/// trim and check fields, and return an [`ApplicationError`] (usually built
/// with [`invalid_request`]) for anything unacceptable.
pub trait Bind: DeserializeOwned + Default + Send {
    fn bind(&mut self, request: &RawRequest<'_>) -> Result<(), BoxError>;
}

/// Read-only view of the inbound request available to [`Bind::bind`].
#[derive(Debug)]
pub struct RawRequest<'a> {
    parts: &'a Parts,
    path_params: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl<'a> RawRequest<'a> {
    /// Build a view over `parts` with explicit parameters.
    pub fn new(
        parts: &'a Parts,
        path_params: HashMap<String, String>,
        query: HashMap<String, String>,
    ) -> Self {
        Self {
            parts,
            path_params,
            query,
        }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn parts(&self) -> &Parts {
        self.parts
    }

    /// Value of the router path parameter `name`.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Value of the query parameter `name`. For repeated parameters the last
    /// occurrence wins.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Why a request could not be turned into a typed value.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The body stream failed. Classified as internal.
    #[error("failed to read request body: {0}")]
    Read(#[source] axum::Error),

    /// The body exceeded the request's body limit. Carries
    /// [`ERR_PAYLOAD_TOO_LARGE`].
    #[error("{0}")]
    TooLarge(#[source] ApplicationError),

    /// The body is not valid for the target type. Carries a bad-request
    /// [`ApplicationError`] with UI code `INVALID_REQUEST_BODY`.
    #[error("{0}")]
    Malformed(#[source] ApplicationError),

    /// [`Bind::bind`] rejected the value.
    #[error("{0}")]
    Bind(#[source] BoxError),
}

impl DecodeError {
    fn malformed(cause: impl Into<BoxError>) -> Self {
        DecodeError::Malformed(invalid_request(cause, UI_INVALID_REQUEST_BODY))
    }

    fn from_read(err: axum::Error) -> Self {
        if exceeds_limit(&err) {
            DecodeError::TooLarge(ERR_PAYLOAD_TOO_LARGE.clone().with_cause(err))
        } else {
            DecodeError::Read(err)
        }
    }
}

/// Buffer the whole body of `request`, honouring its `DefaultBodyLimit`.
pub(crate) async fn read_body(request: Request) -> Result<(Parts, Bytes), DecodeError> {
    let (parts, body) = request.with_limited_body().into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(DecodeError::from_read)?;
    Ok((parts, bytes))
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

/// Decode `request` into `T` and run its [`Bind`] hook.
pub async fn decode_request<T: Bind>(request: Request) -> Result<T, DecodeError> {
    let (mut parts, bytes) = read_body(request).await?;

    let mut value: T = if bytes.iter().all(u8::is_ascii_whitespace) {
        T::default()
    } else if is_form(&parts.headers) {
        serde_urlencoded::from_bytes(&bytes).map_err(DecodeError::malformed)?
    } else {
        serde_json::from_slice(&bytes).map_err(DecodeError::malformed)?
    };

    let path_params = path_params(&mut parts).await;
    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(query)| query)
        .unwrap_or_default();

    let raw = RawRequest::new(&parts, path_params, query);
    value.bind(&raw).map_err(DecodeError::Bind)?;
    Ok(value)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains(FORM_CONTENT_TYPE))
}

async fn path_params(parts: &mut Parts) -> HashMap<String, String> {
    match RawPathParams::from_request_parts(parts, &()).await {
        Ok(params) => params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        Err(_) => HashMap::new(),
    }
}
