//! Resolves an instance address to the volume behind the target device.

use std::sync::Arc;

use cloud::ComputeService;
use serde::Serialize;
use tracing::debug;

use crate::error::{RemediationError, Result};

/// The instance and volume to remediate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetResource {
    pub instance_id: String,
    pub volume_id: String,
}

/// Looks up the instance and its attached volume.
pub struct DeviceLocator {
    compute: Arc<dyn ComputeService>,
    address_filter: String,
    target_device: String,
}

impl DeviceLocator {
    pub fn new(
        compute: Arc<dyn ComputeService>,
        address_filter: impl Into<String>,
        target_device: impl Into<String>,
    ) -> Self {
        Self {
            compute,
            address_filter: address_filter.into(),
            target_device: target_device.into(),
        }
    }

    pub async fn locate(&self, address: &str) -> Result<TargetResource> {
        let instances = self
            .compute
            .find_instances(&self.address_filter, address)
            .await?;

        let instance = match instances.as_slice() {
            [] => {
                return Err(RemediationError::InstanceNotFound {
                    address: address.to_string(),
                })
            }
            [instance] => instance,
            many => {
                return Err(RemediationError::AmbiguousMatch {
                    kind: "instances",
                    key: address.to_string(),
                    count: many.len(),
                })
            }
        };

        let volume_id = instance
            .block_devices
            .iter()
            .find(|d| d.device_name == self.target_device)
            .and_then(|d| d.volume_id.clone())
            .ok_or_else(|| RemediationError::DeviceNotAttached {
                instance_id: instance.id.clone(),
                device: self.target_device.clone(),
            })?;

        debug!(instance_id = %instance.id, volume_id = %volume_id, "Located target volume");

        Ok(TargetResource {
            instance_id: instance.id.clone(),
            volume_id,
        })
    }
}
