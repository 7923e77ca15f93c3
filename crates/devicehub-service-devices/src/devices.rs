//! Device request and response types.

use devicehub_lib::{BoxError, invalid_request};
use devicehub_service_shared::{Bind, RawRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Required prefix of device ids.
pub const DEVICE_ID_PREFIX: &str = "/devices/";

/// Required prefix of device model references.
pub const DEVICE_MODEL_PREFIX: &str = "/devicemodels/";

pub const UI_INVALID_REQUEST_DEVICE_PREFIX: &str = "INVALID_REQUEST_DEVICE_PREFIX";
pub const UI_INVALID_REQUEST_DEVICE_MODEL_PREFIX: &str = "INVALID_REQUEST_DEVICE_MODEL_PREFIX";
pub const UI_INVALID_REQUEST_REQUIRED_FIELD: &str = "INVALID_REQUEST_REQUIRED_FIELD";
pub const UI_REQUIRED_DEVICE_ID_PARAM: &str = "REQUIRED_DEVICE_ID_PARAM";

/// Why a device request was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("device id must start with /devices/")]
    DeviceIdPrefix,

    #[error("device model must start with /devicemodels/")]
    DeviceModelPrefix,

    #[error("id path parameter is required")]
    MissingIdParam,
}

impl ValidationError {
    /// UI code reported to clients.
    pub fn ui_code(&self) -> &'static str {
        match self {
            ValidationError::Required(_) => UI_INVALID_REQUEST_REQUIRED_FIELD,
            ValidationError::DeviceIdPrefix => UI_INVALID_REQUEST_DEVICE_PREFIX,
            ValidationError::DeviceModelPrefix => UI_INVALID_REQUEST_DEVICE_MODEL_PREFIX,
            ValidationError::MissingIdParam => UI_REQUIRED_DEVICE_ID_PARAM,
        }
    }

    fn into_bind_error(self) -> BoxError {
        let ui_code = self.ui_code();
        invalid_request(self, ui_code).into()
    }
}

/// A registered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub device_model: String,
    pub name: String,
    pub note: String,
    pub serial: String,
}

/// Body of `POST /api/devices`. Accepted as JSON or as a form.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CreateDeviceRequest {
    pub id: String,
    #[serde(rename = "deviceModel")]
    pub device_model: String,
    pub name: String,
    pub note: String,
    pub serial: String,
}

impl CreateDeviceRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("id", &self.id),
            ("deviceModel", &self.device_model),
            ("name", &self.name),
            ("note", &self.note),
            ("serial", &self.serial),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ValidationError::Required(*field));
        }

        if !self.id.starts_with(DEVICE_ID_PREFIX) {
            return Err(ValidationError::DeviceIdPrefix);
        }
        if !self.device_model.starts_with(DEVICE_MODEL_PREFIX) {
            return Err(ValidationError::DeviceModelPrefix);
        }
        Ok(())
    }
}

impl Bind for CreateDeviceRequest {
    fn bind(&mut self, _request: &RawRequest<'_>) -> Result<(), BoxError> {
        self.validate().map_err(ValidationError::into_bind_error)
    }
}

impl From<CreateDeviceRequest> for Device {
    fn from(request: CreateDeviceRequest) -> Self {
        Self {
            id: request.id,
            device_model: request.device_model,
            name: request.name,
            note: request.note,
            serial: request.serial,
        }
    }
}

/// Path parameters of `GET /api/devices/{id}`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GetDeviceByIdRequest {
    pub id: String,
}

impl Bind for GetDeviceByIdRequest {
    fn bind(&mut self, request: &RawRequest<'_>) -> Result<(), BoxError> {
        self.id = request.path_param("id").unwrap_or_default().to_string();
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingIdParam.into_bind_error());
        }
        Ok(())
    }
}

/// Body of `GET /api/devices/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceResponse {
    pub id: String,
    #[serde(rename = "deviceModel")]
    pub device_model: String,
    pub name: String,
    pub note: String,
    pub serial: String,
}

impl From<Device> for DeviceResponse {
    fn from(device: Device) -> Self {
        Self {
            id: device.id,
            device_model: device.device_model,
            name: device.name,
            note: device.note,
            serial: device.serial,
        }
    }
}
