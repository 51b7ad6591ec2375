//! Devices owned by the host integration, keyed by entry id.

use std::collections::BTreeMap;
use tracing::info;

use crate::device::Device;
use crate::transport::Transport;

/// Initialized devices of one bridge instance.
#[derive(Debug)]
pub struct DeviceRegistry<T: Transport> {
    devices: BTreeMap<String, Device<T>>,
}

impl<T: Transport> Default for DeviceRegistry<T> {
    fn default() -> Self {
        Self {
            devices: BTreeMap::new(),
        }
    }
}

impl<T: Transport> DeviceRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device, returning the one it replaces.
    pub fn insert(&mut self, entry_id: impl Into<String>, device: Device<T>) -> Option<Device<T>> {
        self.devices.insert(entry_id.into(), device)
    }

    pub fn get(&self, entry_id: &str) -> Option<&Device<T>> {
        self.devices.get(entry_id)
    }

    pub fn entry_ids(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Remove and unload one device. Returns `false` if it was not registered.
    pub async fn unload(&mut self, entry_id: &str) -> bool {
        match self.devices.remove(entry_id) {
            Some(device) => {
                device.unload().await;
                info!(entry = %entry_id, "Unloaded device");
                true
            }
            None => false,
        }
    }

    /// Unload every device, closing their transports.
    pub async fn unload_all(&mut self) {
        let devices = std::mem::take(&mut self.devices);
        for (entry_id, device) in devices {
            device.unload().await;
            info!(entry = %entry_id, "Unloaded device");
        }
    }
}
