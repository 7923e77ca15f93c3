//! devicehub device registry HTTP microservice.
//!
//! # Endpoints
//!
//! - `POST /api/devices` - Register a device (JSON or form body)
//! - `GET /api/devices/{id}` - Fetch a device; the id is percent-encoded
//! - `GET /health` - Liveness probe
//!
//! # Configuration
//!
//! See [`ServiceConfig`]: `SERVICE_PORT`, `LOCALES_BASE_PATH`,
//! `LOCALES_SUPPORTED_LANGUAGES`, `ALLOWED_ORIGIN`, `MAX_BODY_BYTES`, `LOG_LEVEL`,
//! `LOG_FORMAT`.

mod devices;
mod store;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use devicehub_lib::BoxError;
use devicehub_service_shared::{
    RequestContext, ServiceConfig, Transport, created_response, decode_request, health_live,
    init_logging, response_with_body, with_middleware,
};
use tracing::{error, info};

use crate::devices::{CreateDeviceRequest, DeviceResponse, GetDeviceByIdRequest};
use crate::store::DeviceStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::from_env();
    let mut logging_config = config.logging.clone();
    if logging_config.service.is_none() {
        logging_config = logging_config.with_service("devices");
    }
    init_logging(&logging_config);

    let localizer = config.localizer();
    let bundle = localizer.initialize();
    info!(
        base_path = %config.locales.base_path.display(),
        languages = ?bundle.languages(),
        "message catalogs loaded"
    );

    let store = Arc::new(DeviceStore::new());
    let app = app(
        store,
        Transport::new(localizer).with_max_body_bytes(config.http.max_body_bytes),
        &config.http.allowed_origins,
    );

    let addr = config.http.socket_addr();
    info!(addr = %addr, "listening on");

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "failed to bind listener");
        e
    })?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Build the service router. Only `/api` routes run through the middleware
/// chain; the health probe stays bare.
fn app(store: Arc<DeviceStore>, transport: Transport, allowed_origins: &[String]) -> Router {
    let create_store = Arc::clone(&store);
    let create = move |context: RequestContext, request: CreateDeviceRequest| {
        let store = Arc::clone(&create_store);
        async move { create_device(&store, context, request).await }
    };

    let get_store = Arc::clone(&store);
    let get_by_id = move |context: RequestContext, request: GetDeviceByIdRequest| {
        let store = Arc::clone(&get_store);
        async move { get_device_by_id(&store, context, request).await }
    };

    let api = Router::new()
        .route(
            "/api/devices",
            post(transport.make_handler(
                create,
                decode_request::<CreateDeviceRequest>,
                created_response,
            )),
        )
        .route(
            "/api/devices/{id}",
            get(transport.make_handler(
                get_by_id,
                decode_request::<GetDeviceByIdRequest>,
                response_with_body,
            )),
        );

    with_middleware(api, transport, allowed_origins).route("/health", get(health_live))
}

async fn create_device(
    store: &DeviceStore,
    context: RequestContext,
    request: CreateDeviceRequest,
) -> Result<(), BoxError> {
    info!(request_id = %context.request_id, device_id = %request.id, "creating device");
    store.create(request.into()).await?;
    Ok(())
}

async fn get_device_by_id(
    store: &DeviceStore,
    context: RequestContext,
    request: GetDeviceByIdRequest,
) -> Result<DeviceResponse, BoxError> {
    info!(request_id = %context.request_id, device_id = %request.id, "fetching device");
    let device = store.get_by_id(&request.id).await?;
    Ok(device.into())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
