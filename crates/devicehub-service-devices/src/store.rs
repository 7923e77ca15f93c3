//! In-memory device registry.

use std::collections::HashMap;

use devicehub_lib::{ApplicationError, ERR_CONFLICT, ERR_RECORD_NOT_FOUND};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::devices::Device;

/// Failure of a store operation. Wraps the classified error that decides the
/// response.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create device: {0}")]
    Create(#[source] ApplicationError),

    #[error("failed to get device: {0}")]
    Get(#[source] ApplicationError),
}

/// Devices keyed by id.
#[derive(Debug, Default)]
pub struct DeviceStore {
    devices: RwLock<HashMap<String, Device>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `device`. Fails with a conflict when the id is taken.
    pub async fn create(&self, device: Device) -> Result<(), StoreError> {
        let mut devices = self.devices.write().await;
        if devices.contains_key(&device.id) {
            return Err(StoreError::Create(
                ERR_CONFLICT.clone().with_var("name", "device"),
            ));
        }

        tracing::debug!(device_id = %device.id, "device created");
        devices.insert(device.id.clone(), device);
        Ok(())
    }

    /// Look up a device by id.
    pub async fn get_by_id(&self, id: &str) -> Result<Device, StoreError> {
        self.devices
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::Get(ERR_RECORD_NOT_FOUND.clone().with_var("name", "Device")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devicehub_lib::{ErrorKind, error_kind};

    fn device(id: &str) -> Device {
        Device {
            id: id.to_string(),
            device_model: "/devicemodels/m1".to_string(),
            name: "Sensor".to_string(),
            note: "note".to_string(),
            serial: "S1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = DeviceStore::new();
        store.create(device("/devices/a")).await.unwrap();

        let found = store.get_by_id("/devices/a").await.unwrap();
        assert_eq!(found, device("/devices/a"));
    }

    #[tokio::test]
    async fn test_duplicate_is_conflict() {
        let store = DeviceStore::new();
        store.create(device("/devices/a")).await.unwrap();

        let err = store.create(device("/devices/a")).await.unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Conflict);
        assert!(ERR_CONFLICT.is(&err));
    }

    #[tokio::test]
    async fn test_missing_is_not_found() {
        let err = DeviceStore::new().get_by_id("/devices/x").await.unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::NotFound);
        assert!(ERR_RECORD_NOT_FOUND.is(&err));
        assert!(err.to_string().starts_with("failed to get device: "));
    }
}
