//! Handler adapter and error encoding.

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;

use devicehub_lib::{find_application_error, BoxError, Localizer, UI_INTERNAL_SERVER_ERROR};

use crate::context::RequestContext;
use crate::encode::{error_body_response, ErrorResponse};

/// Request body limit applied by the middleware chain unless configured.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Future returned by handlers built with [`Transport::make_handler`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Shared HTTP plumbing: owns the localizer used on the error path and the
/// request body limit.
#[derive(Debug, Clone)]
pub struct Transport {
    localizer: Arc<Localizer>,
    max_body_bytes: usize,
}

impl Transport {
    pub fn new(localizer: Arc<Localizer>) -> Self {
        Self {
            localizer,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Set the largest request body the middleware chain accepts.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn localizer(&self) -> &Localizer {
        &self.localizer
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Encode `err` as a response.
    ///
    /// The first [`ApplicationError`](devicehub_lib::ApplicationError) in the
    /// chain decides the status and provides the message, localized for the
    /// context's language (default language without a context). Anything else
    /// is a 500 carrying the raw error text.
    pub fn error_response(
        &self,
        context: Option<&RequestContext>,
        err: &(dyn StdError + 'static),
    ) -> Response {
        let language = context.map_or("", |ctx| ctx.language.as_str());

        let (status, body) = match find_application_error(err) {
            Some(app_err) => (
                StatusCode::from_u16(app_err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                ErrorResponse {
                    error: self.localizer.localize(&app_err.localizable, language),
                    ui_code: app_err.ui_code.clone(),
                },
            ),
            None => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: err.to_string(),
                    ui_code: UI_INTERNAL_SERVER_ERROR.to_string(),
                },
            ),
        };

        tracing::debug!(
            error = %err,
            status_code = status.as_u16(),
            ui_code = %body.ui_code,
            language,
            "encoding error response"
        );

        error_body_response(status, &body)
    }

    /// Bind a decoder, an endpoint and an encoder into an axum handler.
    ///
    /// A failure at any stage goes through [`Transport::error_response`] with
    /// the request's [`RequestContext`]. Requests that bypassed the context
    /// middleware get a default context.
    ///
    /// ```no_run
    /// use axum::{routing::post, Router};
    /// use devicehub_lib::BoxError;
    /// use devicehub_service_shared::{decode_request, response_with_body, Bind, RawRequest, RequestContext, Transport};
    ///
    /// #[derive(Default, serde::Deserialize)]
    /// struct Ping { text: String }
    ///
    /// impl Bind for Ping {
    ///     fn bind(&mut self, _: &RawRequest<'_>) -> Result<(), BoxError> { Ok(()) }
    /// }
    ///
    /// async fn echo(_ctx: RequestContext, ping: Ping) -> Result<String, BoxError> {
    ///     Ok(ping.text)
    /// }
    ///
    /// let transport = Transport::new(Default::default());
    /// let router: Router = Router::new().route(
    ///     "/echo",
    ///     post(transport.make_handler(echo, decode_request::<Ping>, response_with_body)),
    /// );
    /// ```
    pub fn make_handler<T, R, Ep, EpFut, EpErr, De, DeFut, DeErr, En, EnErr>(
        &self,
        endpoint: Ep,
        decode: De,
        encode: En,
    ) -> impl Fn(Request) -> HandlerFuture + Clone + Send + Sync + 'static
    where
        T: Send + 'static,
        R: Send + 'static,
        Ep: Fn(RequestContext, T) -> EpFut + Clone + Send + Sync + 'static,
        EpFut: Future<Output = Result<R, EpErr>> + Send + 'static,
        EpErr: Into<BoxError>,
        De: Fn(Request) -> DeFut + Clone + Send + Sync + 'static,
        DeFut: Future<Output = Result<T, DeErr>> + Send + 'static,
        DeErr: Into<BoxError>,
        En: Fn(R) -> Result<Response, EnErr> + Clone + Send + Sync + 'static,
        EnErr: Into<BoxError>,
    {
        let transport = self.clone();

        move |request: Request| -> HandlerFuture {
            let transport = transport.clone();
            let endpoint = endpoint.clone();
            let decode = decode.clone();
            let encode = encode.clone();

            Box::pin(async move {
                let context = request
                    .extensions()
                    .get::<RequestContext>()
                    .cloned()
                    .unwrap_or_default();

                let value = match decode(request).await {
                    Ok(value) => value,
                    Err(err) => return transport.failure(&context, err.into()),
                };

                let result = match endpoint(context.clone(), value).await {
                    Ok(result) => result,
                    Err(err) => return transport.failure(&context, err.into()),
                };

                match encode(result) {
                    Ok(response) => response,
                    Err(err) => transport.failure(&context, err.into()),
                }
            })
        }
    }

    fn failure(&self, context: &RequestContext, err: BoxError) -> Response {
        self.error_response(Some(context), err.as_ref())
    }
}
