//! Publishes device descriptors and bridge status to Zenoh.
//!
//! # Key Expressions
//!
//! ```text
//! <prefix>/<entry_id>/@/device   descriptor and per-platform assignments
//! <prefix>/<entry_id>/@/status   setup progress of one entry
//! <prefix>/@/status              bridge liveness
//! ```

use adlar_common::KeyExprBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;
use zenoh::Session;

use crate::catalog::Platform;
use crate::device::{Device, DeviceInfo, SetupError, SetupReason};
use crate::identity::DeviceIdentity;
use crate::transport::Transport;

/// Errors while publishing to Zenoh.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Invalid key expression: {0}")]
    KeyExpr(#[from] adlar_common::Error),
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to publish to '{key}': {message}")]
    Put { key: String, message: String },
}

/// What a host needs to create entities for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    pub info: DeviceInfo,
    pub identity: DeviceIdentity,
    /// Platforms with at least one attribute, each in resolved order
    pub assignments: BTreeMap<Platform, Vec<&'static str>>,
}

impl DeviceSnapshot {
    pub fn from_device<T: Transport>(device: &Device<T>) -> Self {
        let assignments = Platform::ALL
            .iter()
            .map(|&platform| (platform, device.get_assigned(platform)))
            .filter(|(_, ids)| !ids.is_empty())
            .collect();

        Self {
            info: device.device_info(),
            identity: *device.identity(),
            assignments,
        }
    }

    /// Number of attributes across all platforms.
    pub fn attribute_count(&self) -> usize {
        self.assignments.values().map(Vec::len).sum()
    }
}

/// Setup state of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EntryStatus {
    Ready { attributes: usize },
    NotReady { reason: SetupReason, message: String },
}

impl EntryStatus {
    pub fn not_ready(err: &SetupError) -> Self {
        EntryStatus::NotReady {
            reason: err.reason(),
            message: err.to_string(),
        }
    }
}

/// Bridge liveness published under `<prefix>/@/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeStatus {
    pub bridge: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub entries: Vec<String>,
    pub timestamp: i64,
}

impl BridgeStatus {
    pub fn running(entries: Vec<String>) -> Self {
        Self::new("running", entries)
    }

    pub fn offline() -> Self {
        Self::new("offline", Vec::new())
    }

    fn new(status: &'static str, entries: Vec<String>) -> Self {
        Self {
            bridge: "adlar",
            version: env!("CARGO_PKG_VERSION"),
            status,
            entries,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Writes bridge metadata to a Zenoh session.
#[derive(Clone)]
pub struct DevicePublisher {
    session: Session,
    keys: KeyExprBuilder,
}

impl DevicePublisher {
    pub fn new(session: Session, keys: KeyExprBuilder) -> Self {
        Self { session, keys }
    }

    /// Publish the descriptor of an initialized device and mark it ready.
    ///
    /// Takes the snapshot by value so callers release the device borrow
    /// before anything is awaited.
    pub async fn publish_snapshot(
        &self,
        entry_id: &str,
        snapshot: DeviceSnapshot,
    ) -> Result<(), PublishError> {
        let status = EntryStatus::Ready {
            attributes: snapshot.attribute_count(),
        };
        self.put(self.keys.device_key(entry_id)?, &snapshot).await?;
        self.put(self.keys.device_status_key(entry_id)?, &status)
            .await
    }

    /// Tell the host an entry could not be set up yet.
    pub async fn publish_not_ready(
        &self,
        entry_id: &str,
        err: &SetupError,
    ) -> Result<(), PublishError> {
        let status = EntryStatus::not_ready(err);
        self.put(self.keys.device_status_key(entry_id)?, &status)
            .await
    }

    pub async fn publish_bridge_status(&self, status: &BridgeStatus) -> Result<(), PublishError> {
        self.put(self.keys.status_key(), status).await
    }

    async fn put<P: Serialize>(&self, key: String, payload: &P) -> Result<(), PublishError> {
        let payload = serde_json::to_string(payload)?;
        self.session
            .put(&key, payload)
            .await
            .map_err(|e| PublishError::Put {
                key: key.clone(),
                message: e.to_string(),
            })?;
        debug!("Published {}", key);
        Ok(())
    }
}
