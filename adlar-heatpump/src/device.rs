//! Device facade: probe a unit, resolve its capabilities and expose the
//! result to the host integration.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::catalog::{Catalog, Platform};
use crate::identity::{DeviceIdentity, Feature, FeaturePresence, HardwareType};
use crate::probe::{IdentityProbe, ProbeError};
use crate::resolver::{ResolvedAttributeMap, resolve};
use crate::transport::{Transport, TransportError};

/// Manufacturer reported to the host's device registry.
pub const MANUFACTURER: &str = "AdlarCastra";

/// Area suggested to the host for new devices.
pub const SUGGESTED_AREA: &str = "Groundfloor";

/// Capability that also gates reading the board revision.
pub const HARDWARE_VERSION_ATTRIBUTE: &str = "get_controller_hardware_version";

/// The unit reports a model code this integration has no rules for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("hardware type {0} is not supported")]
pub struct UnsupportedDeviceError(pub HardwareType);

/// Why setup stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupReason {
    Transport,
    UnrecognizedHardware,
    MissingBusVersion,
}

impl SetupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetupReason::Transport => "transport",
            SetupReason::UnrecognizedHardware => "unrecognized_hardware",
            SetupReason::MissingBusVersion => "missing_bus_version",
        }
    }
}

impl fmt::Display for SetupReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying failure behind a [`SetupError`].
#[derive(Debug, Error)]
pub enum SetupCause {
    #[error("connect failed: {0}")]
    Connect(#[source] TransportError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Unsupported(#[from] UnsupportedDeviceError),
}

/// Device setup failed; the host should treat the entry as not ready.
#[derive(Debug, Error)]
#[error("device setup failed ({reason}): {message}")]
pub struct SetupError {
    reason: SetupReason,
    message: String,
    #[source]
    cause: Option<SetupCause>,
}

impl SetupError {
    fn new(reason: SetupReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
            cause: None,
        }
    }

    fn with_cause(mut self, cause: impl Into<SetupCause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    fn connect(err: TransportError) -> Self {
        Self::new(SetupReason::Transport, "could not open the connection")
            .with_cause(SetupCause::Connect(err))
    }

    fn probe(err: ProbeError) -> Self {
        Self::new(SetupReason::Transport, format!("could not read {}", err.what)).with_cause(err)
    }

    pub fn reason(&self) -> SetupReason {
        self.reason
    }

    pub fn cause(&self) -> Option<&SetupCause> {
        self.cause.as_ref()
    }

    /// The unsupported model, when that is what stopped setup.
    pub fn unsupported(&self) -> Option<&UnsupportedDeviceError> {
        match &self.cause {
            Some(SetupCause::Unsupported(err)) => Some(err),
            _ => None,
        }
    }
}

/// Descriptor handed to the host's device registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hw_version: Option<String>,
    pub suggested_area: &'static str,
}

struct Probed {
    identity: DeviceIdentity,
    device_type: String,
    sw_version: Option<String>,
    hw_version: Option<String>,
    attributes: ResolvedAttributeMap,
}

/// An initialized unit.
///
/// Owns its transport; the resolved attribute map is fixed for the
/// lifetime of the value.
pub struct Device<T: Transport> {
    name: String,
    identity: DeviceIdentity,
    device_type: String,
    sw_version: Option<String>,
    hw_version: Option<String>,
    attributes: ResolvedAttributeMap,
    transport: T,
}

impl<T: Transport> fmt::Debug for Device<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("identity", &self.identity)
            .field("device_type", &self.device_type)
            .field("attributes", &self.attributes.len())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Device<T> {
    /// Connect, probe and resolve.
    ///
    /// On any failure the transport is closed before the error is returned.
    pub async fn initialize(
        name: impl Into<String>,
        mut transport: T,
        catalog: &Catalog,
    ) -> Result<Self, SetupError> {
        let name = name.into();
        debug!(device = %name, "Setup has started");

        match setup(&mut transport, catalog).await {
            Ok(probed) => {
                info!(
                    device = %name,
                    model = %probed.device_type,
                    bus_version = probed.identity.bus_version,
                    attributes = probed.attributes.len(),
                    "Device setup complete"
                );
                Ok(Self {
                    name,
                    identity: probed.identity,
                    device_type: probed.device_type,
                    sw_version: probed.sw_version,
                    hw_version: probed.hw_version,
                    attributes: probed.attributes,
                    transport,
                })
            }
            Err(e) => {
                transport.close().await;
                error!(device = %name, reason = %e.reason(), "{}", e);
                Err(e)
            }
        }
    }

    /// Attribute ids resolved for `platform`, in resolved order.
    pub fn get_assigned(&self, platform: Platform) -> Vec<&'static str> {
        self.attributes.assigned(platform)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model name including the AIR/GEO suffix.
    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn software_version(&self) -> Option<&str> {
        self.sw_version.as_deref()
    }

    pub fn hardware_version(&self) -> Option<&str> {
        self.hw_version.as_deref()
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn attributes(&self) -> &ResolvedAttributeMap {
        &self.attributes
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifier: format!("{}{}", self.name, self.device_type),
            name: self.name.clone(),
            manufacturer: MANUFACTURER,
            model: self.device_type.clone(),
            sw_version: self.sw_version.clone(),
            hw_version: self.hw_version.clone(),
            suggested_area: SUGGESTED_AREA,
        }
    }

    /// Release the connection and drop the device.
    pub async fn unload(mut self) {
        self.transport.close().await;
        debug!(device = %self.name, "Device unloaded");
    }
}

async fn setup<T: Transport>(transport: &mut T, catalog: &Catalog) -> Result<Probed, SetupError> {
    transport.connect().await.map_err(SetupError::connect)?;
    debug!("Modbus connection is open");

    let mut probe = IdentityProbe::new(transport);

    let hardware_type = probe
        .read_hardware_type()
        .await
        .map_err(SetupError::probe)?
        .ok_or_else(|| {
            SetupError::new(
                SetupReason::UnrecognizedHardware,
                "hardware type register returned no value",
            )
        })?;
    debug!("Device Type = {}", hardware_type);

    if !hardware_type.is_supported() {
        return Err(SetupError::new(
            SetupReason::UnrecognizedHardware,
            format!("hardware type {} is not supported", hardware_type.code()),
        )
        .with_cause(UnsupportedDeviceError(hardware_type)));
    }

    let bus_version = probe
        .read_bus_version()
        .await
        .map_err(SetupError::probe)?
        .ok_or_else(|| {
            SetupError::new(
                SetupReason::MissingBusVersion,
                "bus version register returned no value",
            )
        })?;
    debug!("Bus version = {}", bus_version);

    let variant = probe
        .read_variant_flag(hardware_type)
        .await
        .map_err(SetupError::probe)?;

    let sw_version = probe
        .read_software_version()
        .await
        .map_err(SetupError::probe)?;
    debug!("Device Software = {:?}", sw_version);

    let co2 = probe
        .read_feature_presence(Feature::Co2, bus_version, variant)
        .await
        .map_err(SetupError::probe)?;

    let identity = DeviceIdentity::new(hardware_type, bus_version)
        .with_variant(variant)
        .with_features(FeaturePresence { co2 });
    let attributes = resolve(catalog, &identity);

    let hw_version = if attributes.contains(HARDWARE_VERSION_ATTRIBUTE) {
        probe
            .read_hardware_version()
            .await
            .map_err(SetupError::probe)?
    } else {
        None
    };

    Ok(Probed {
        device_type: identity.display_type(),
        identity,
        sw_version,
        hw_version,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_reason_strings() {
        assert_eq!(SetupReason::Transport.to_string(), "transport");
        assert_eq!(
            serde_json::to_value(SetupReason::MissingBusVersion).unwrap(),
            "missing_bus_version"
        );
    }

    #[test]
    fn test_setup_error_exposes_unsupported_model() {
        let err = SetupError::new(SetupReason::UnrecognizedHardware, "not supported")
            .with_cause(UnsupportedDeviceError(HardwareType::new(999)));

        assert_eq!(err.reason(), SetupReason::UnrecognizedHardware);
        assert_eq!(err.unsupported().map(|e| e.0.code()), Some(999));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_setup_error_without_cause() {
        let err = SetupError::new(SetupReason::MissingBusVersion, "no value");
        assert!(err.cause().is_none());
        assert!(err.unsupported().is_none());
        assert_eq!(
            err.to_string(),
            "device setup failed (missing_bus_version): no value"
        );
    }
}
