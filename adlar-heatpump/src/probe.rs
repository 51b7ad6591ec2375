//! Identity probe: the handful of register reads that identify a unit.
//!
//! Each read is one transport round trip. Reads of registers that older
//! firmware does not implement are skipped instead of attempted.

use thiserror::Error;
use tracing::{debug, warn};

use crate::identity::{
    BusVersion, FEATURE_PROBE_MIN_BUS_VERSION, Feature, HardwareType, VariantFlag,
};
use crate::registers::{self, Register};
use crate::transport::{Transport, TransportError};

/// Transport-level failure while reading an identifying register.
#[derive(Debug, Error)]
#[error("failed to read {what} ({register}): {source}")]
pub struct ProbeError {
    pub what: &'static str,
    pub register: Register,
    #[source]
    pub source: TransportError,
}

/// Whether the firmware can be asked about add-on presence.
pub fn feature_probe_allowed(bus_version: BusVersion, variant: VariantFlag) -> bool {
    bus_version >= FEATURE_PROBE_MIN_BUS_VERSION || variant.is_variant()
}

/// Reads identity registers over a borrowed transport.
pub struct IdentityProbe<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> IdentityProbe<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self { transport }
    }

    async fn read(&mut self, what: &'static str, register: Register) -> Result<Option<u16>, ProbeError> {
        let value = self
            .transport
            .read_register(register)
            .await
            .map_err(|source| ProbeError {
                what,
                register,
                source,
            })?;
        debug!("{} ({}) = {:?}", what, register, value);
        Ok(value)
    }

    /// Controller model code. `None` if the unit answered without a value.
    pub async fn read_hardware_type(&mut self) -> Result<Option<HardwareType>, ProbeError> {
        Ok(self
            .read("hardware type", registers::CONTROL_TYPE)
            .await?
            .map(HardwareType::new))
    }

    /// Bus protocol version. `None` if the unit answered without a value.
    pub async fn read_bus_version(&mut self) -> Result<Option<BusVersion>, ProbeError> {
        self.read("bus version", registers::BUS_VERSION).await
    }

    /// AIR/GEO variant; only read for variant-capable models.
    pub async fn read_variant_flag(
        &mut self,
        hardware_type: HardwareType,
    ) -> Result<VariantFlag, ProbeError> {
        if !hardware_type.is_variant_capable() {
            return Ok(VariantFlag::None);
        }

        let code = self.read("air/geo type", registers::AIR_GEO_TYPE).await?;
        let variant = code.map_or(VariantFlag::Unrecognized, VariantFlag::from_code);
        if variant == VariantFlag::Unrecognized {
            warn!("Unknown air/geo type {:?}, using variant rules without a suffix", code);
        }
        Ok(variant)
    }

    /// Whether an add-on is fitted. Firmware below the probe threshold is
    /// assumed to have none and is not asked.
    pub async fn read_feature_presence(
        &mut self,
        feature: Feature,
        bus_version: BusVersion,
        variant: VariantFlag,
    ) -> Result<bool, ProbeError> {
        if !feature_probe_allowed(bus_version, variant) {
            debug!(
                "Skipping {} presence probe on bus version {}",
                feature, bus_version
            );
            return Ok(false);
        }

        let register = match feature {
            Feature::Co2 => registers::CO2_PRESENT,
        };
        Ok(self
            .read("co2 present", register)
            .await?
            .is_some_and(|value| value != 0))
    }

    /// Application firmware version as `major.minor.release`.
    pub async fn read_software_version(&mut self) -> Result<Option<String>, ProbeError> {
        let major = self.read("software major", registers::APP_VERSION_MAJOR).await?;
        let minor = self.read("software minor", registers::APP_VERSION_MINOR).await?;
        let release = self.read("software release", registers::APP_VERSION_RELEASE).await?;

        Ok(match (major, minor, release) {
            (Some(major), Some(minor), Some(release)) => {
                Some(format!("{}.{}.{}", major, minor, release))
            }
            _ => None,
        })
    }

    /// Controller board revision.
    pub async fn read_hardware_version(&mut self) -> Result<Option<String>, ProbeError> {
        Ok(self
            .read("hardware version", registers::HARDWARE_VERSION)
            .await?
            .map(|value| value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    async fn connected(transport: MockTransport) -> MockTransport {
        let mut transport = transport;
        transport.connect().await.unwrap();
        transport
    }

    #[test]
    fn test_feature_probe_gate() {
        assert!(!feature_probe_allowed(9, VariantFlag::None));
        assert!(feature_probe_allowed(10, VariantFlag::None));
        assert!(feature_probe_allowed(3, VariantFlag::Geo));
    }

    #[tokio::test]
    async fn test_variant_not_read_for_standard_models() {
        let mut transport = connected(MockTransport::controller(10, 12)).await;
        let handle = transport.handle();

        let variant = IdentityProbe::new(&mut transport)
            .read_variant_flag(HardwareType::new(10))
            .await
            .unwrap();

        assert_eq!(variant, VariantFlag::None);
        assert!(!handle.was_read(registers::AIR_GEO_TYPE));
    }

    #[tokio::test]
    async fn test_variant_read_for_compact_p() {
        let mut transport =
            connected(MockTransport::controller(44, 12).with_value(registers::AIR_GEO_TYPE, 2))
                .await;

        let variant = IdentityProbe::new(&mut transport)
            .read_variant_flag(HardwareType::new(44))
            .await
            .unwrap();
        assert_eq!(variant, VariantFlag::Geo);
    }

    #[tokio::test]
    async fn test_unknown_variant_code_stays_variant() {
        let mut transport =
            connected(MockTransport::controller(44, 12).with_value(registers::AIR_GEO_TYPE, 9))
                .await;

        let variant = IdentityProbe::new(&mut transport)
            .read_variant_flag(HardwareType::new(44))
            .await
            .unwrap();
        assert_eq!(variant, VariantFlag::Unrecognized);
        assert!(feature_probe_allowed(4, variant));
    }

    #[tokio::test]
    async fn test_empty_variant_answer_stays_variant() {
        let mut transport =
            connected(MockTransport::controller(44, 12).with_empty(registers::AIR_GEO_TYPE)).await;

        let variant = IdentityProbe::new(&mut transport)
            .read_variant_flag(HardwareType::new(44))
            .await
            .unwrap();
        assert_eq!(variant, VariantFlag::Unrecognized);
    }

    #[tokio::test]
    async fn test_zero_variant_code_is_standard() {
        let mut transport =
            connected(MockTransport::controller(44, 12).with_value(registers::AIR_GEO_TYPE, 0))
                .await;

        let variant = IdentityProbe::new(&mut transport)
            .read_variant_flag(HardwareType::new(44))
            .await
            .unwrap();
        assert_eq!(variant, VariantFlag::None);
    }

    #[tokio::test]
    async fn test_co2_not_read_on_old_firmware() {
        let mut transport =
            connected(MockTransport::controller(10, 9).with_value(registers::CO2_PRESENT, 1)).await;
        let handle = transport.handle();

        let present = IdentityProbe::new(&mut transport)
            .read_feature_presence(Feature::Co2, 9, VariantFlag::None)
            .await
            .unwrap();

        assert!(!present);
        assert!(!handle.was_read(registers::CO2_PRESENT));
    }

    #[tokio::test]
    async fn test_co2_read_on_variant_units() {
        let mut transport =
            connected(MockTransport::controller(44, 4).with_value(registers::CO2_PRESENT, 1)).await;

        let present = IdentityProbe::new(&mut transport)
            .read_feature_presence(Feature::Co2, 4, VariantFlag::Air)
            .await
            .unwrap();
        assert!(present);
    }

    #[tokio::test]
    async fn test_software_version() {
        let mut transport = connected(MockTransport::controller(10, 12)).await;
        let version = IdentityProbe::new(&mut transport)
            .read_software_version()
            .await
            .unwrap();
        assert_eq!(version.as_deref(), Some("2.1.4"));
    }

    #[tokio::test]
    async fn test_read_failure_names_register() {
        let mut transport =
            connected(MockTransport::controller(10, 12).with_failure(registers::BUS_VERSION)).await;

        let err = IdentityProbe::new(&mut transport)
            .read_bus_version()
            .await
            .unwrap_err();
        assert_eq!(err.register, registers::BUS_VERSION);
        assert!(err.to_string().contains("bus version"));
    }
}
