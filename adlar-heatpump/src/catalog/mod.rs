//! Capability catalog: which attributes exist, on which platform, and under
//! which conditions a unit exposes them.
//!
//! Rules are evaluated independently, so their order only affects the order
//! of the resolved map, never its content.

mod builtin;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::identity::{BusVersion, Feature, HardwareType};

pub use builtin::BUILTIN_RULES;

/// Host platform an attribute is exposed under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Sensor,
    Switch,
    Select,
}

impl Platform {
    /// Every platform the integration forwards entities to.
    pub const ALL: [Platform; 3] = [Platform::Select, Platform::Sensor, Platform::Switch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Sensor => "sensor",
            Platform::Switch => "switch",
            Platform::Select => "select",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedDevices {
    All,
    Only(&'static [u16]),
}

impl SupportedDevices {
    pub fn contains(&self, hardware_type: HardwareType) -> bool {
        match self {
            SupportedDevices::All => true,
            SupportedDevices::Only(codes) => codes.contains(&hardware_type.code()),
        }
    }
}

/// Version gate for units without an AIR/GEO variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StandardGate {
    pub min_bus_version: BusVersion,
    /// Exclusive upper bound.
    pub max_bus_version: Option<BusVersion>,
    pub excluded_bus_versions: &'static [BusVersion],
}

impl StandardGate {
    pub const fn since(min_bus_version: BusVersion) -> Self {
        Self {
            min_bus_version,
            max_bus_version: None,
            excluded_bus_versions: &[],
        }
    }

    pub const fn below(self, max_bus_version: BusVersion) -> Self {
        Self {
            max_bus_version: Some(max_bus_version),
            ..self
        }
    }

    pub const fn excluding(self, versions: &'static [BusVersion]) -> Self {
        Self {
            excluded_bus_versions: versions,
            ..self
        }
    }

    pub fn admits(&self, bus_version: BusVersion) -> bool {
        if bus_version < self.min_bus_version {
            return false;
        }
        if self.excluded_bus_versions.contains(&bus_version) {
            return false;
        }
        match self.max_bus_version {
            Some(max) => bus_version < max,
            None => true,
        }
    }
}

/// Version gate for AIR/GEO units.
///
/// Only a lower bound exists on this path; exclusions and upper bounds are
/// not applied to variant units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariantGate {
    pub min_variant_bus_version: BusVersion,
}

impl VariantGate {
    pub const fn since(min_variant_bus_version: BusVersion) -> Self {
        Self {
            min_variant_bus_version,
        }
    }

    pub fn admits(&self, bus_version: BusVersion) -> bool {
        bus_version >= self.min_variant_bus_version
    }
}

/// Which activation paths a rule takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Standard(StandardGate),
    Variant(VariantGate),
    Both {
        standard: StandardGate,
        variant: VariantGate,
    },
}

impl Activation {
    pub fn standard(&self) -> Option<&StandardGate> {
        match self {
            Activation::Standard(gate) | Activation::Both { standard: gate, .. } => Some(gate),
            Activation::Variant(_) => None,
        }
    }

    pub fn variant(&self) -> Option<&VariantGate> {
        match self {
            Activation::Variant(gate) | Activation::Both { variant: gate, .. } => Some(gate),
            Activation::Standard(_) => None,
        }
    }
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityRule {
    pub attribute_id: &'static str,
    pub platform: Platform,
    pub devices: SupportedDevices,
    pub activation: Activation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_feature: Option<Feature>,
}

impl CapabilityRule {
    pub const fn new(
        attribute_id: &'static str,
        platform: Platform,
        devices: SupportedDevices,
        activation: Activation,
    ) -> Self {
        Self {
            attribute_id,
            platform,
            devices,
            activation,
            required_feature: None,
        }
    }

    /// Only activate when the given add-on is fitted.
    pub const fn requires(self, feature: Feature) -> Self {
        Self {
            required_feature: Some(feature),
            ..self
        }
    }
}

/// Rules that can never activate, caught when the catalog is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("duplicate attribute '{0}' in capability catalog")]
    DuplicateAttribute(&'static str),

    #[error("attribute '{0}' lists no supported devices")]
    NoDevices(&'static str),

    #[error("attribute '{attribute}' has an empty bus version range [{min}, {max})")]
    EmptyVersionRange {
        attribute: &'static str,
        min: BusVersion,
        max: BusVersion,
    },
}

/// A validated, read-only set of capability rules.
#[derive(Debug, Clone)]
pub struct Catalog {
    rules: Vec<CapabilityRule>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids and rules that can never match.
    pub fn new(rules: impl IntoIterator<Item = CapabilityRule>) -> Result<Self, CatalogError> {
        let rules: Vec<CapabilityRule> = rules.into_iter().collect();
        let mut seen = HashSet::with_capacity(rules.len());

        for rule in &rules {
            if !seen.insert(rule.attribute_id) {
                return Err(CatalogError::DuplicateAttribute(rule.attribute_id));
            }

            if let SupportedDevices::Only(codes) = rule.devices {
                if codes.is_empty() {
                    return Err(CatalogError::NoDevices(rule.attribute_id));
                }
            }

            if let Some(gate) = rule.activation.standard() {
                if let Some(max) = gate.max_bus_version {
                    if max <= gate.min_bus_version {
                        return Err(CatalogError::EmptyVersionRange {
                            attribute: rule.attribute_id,
                            min: gate.min_bus_version,
                            max,
                        });
                    }
                }
            }
        }

        Ok(Self { rules })
    }

    /// The catalog shipped with the integration.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(BUILTIN_RULES.iter().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilityRule> {
        self.rules.iter()
    }

    pub fn get(&self, attribute_id: &str) -> Option<&CapabilityRule> {
        self.rules.iter().find(|rule| rule.attribute_id == attribute_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn sensor(id: &'static str, activation: Activation) -> CapabilityRule {
        CapabilityRule::new(id, Platform::Sensor, SupportedDevices::All, activation)
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.len(), BUILTIN_RULES.len());
        assert!(catalog.get("get_controller_hardware_version").is_some());
    }

    #[test]
    fn test_rejects_duplicate_attribute() {
        let gate = Activation::Standard(StandardGate::since(0));
        let result = Catalog::new([sensor("get_humidity", gate), sensor("get_humidity", gate)]);
        assert_eq!(
            result.unwrap_err(),
            CatalogError::DuplicateAttribute("get_humidity")
        );
    }

    #[test]
    fn test_rejects_empty_device_list() {
        let rule = CapabilityRule::new(
            "get_humidity",
            Platform::Sensor,
            SupportedDevices::Only(&[]),
            Activation::Variant(VariantGate::since(0)),
        );
        assert_eq!(
            Catalog::new([rule]).unwrap_err(),
            CatalogError::NoDevices("get_humidity")
        );
    }

    #[test]
    fn test_rejects_empty_version_range() {
        let rule = sensor(
            "get_humidity",
            Activation::Standard(StandardGate::since(10).below(10)),
        );
        assert!(matches!(
            Catalog::new([rule]),
            Err(CatalogError::EmptyVersionRange { min: 10, max: 10, .. })
        ));
    }

    #[test]
    fn test_standard_gate_bounds() {
        let gate = StandardGate::since(5).below(12).excluding(&[8]);
        assert!(!gate.admits(4));
        assert!(gate.admits(5));
        assert!(!gate.admits(8));
        assert!(gate.admits(11));
        assert!(!gate.admits(12));
    }

    #[test]
    fn test_variant_gate_has_only_lower_bound() {
        let gate = VariantGate::since(10);
        assert!(!gate.admits(9));
        assert!(gate.admits(10));
        assert!(gate.admits(u16::MAX));
    }

    #[test]
    fn test_activation_paths() {
        let both = Activation::Both {
            standard: StandardGate::since(1),
            variant: VariantGate::since(2),
        };
        assert_eq!(both.standard().map(|g| g.min_bus_version), Some(1));
        assert_eq!(both.variant().map(|g| g.min_variant_bus_version), Some(2));

        let standard = Activation::Standard(StandardGate::since(3));
        assert!(standard.variant().is_none());

        let variant = Activation::Variant(VariantGate::since(4));
        assert!(variant.standard().is_none());
    }

    #[test]
    fn test_supported_devices() {
        let only = SupportedDevices::Only(&[10, 44]);
        assert!(only.contains(HardwareType::new(44)));
        assert!(!only.contains(HardwareType::new(17)));
        assert!(SupportedDevices::All.contains(HardwareType::new(17)));
    }

    #[test]
    fn test_rule_serialization() {
        let rule = sensor("get_co2_level", Activation::Standard(StandardGate::since(10)))
            .requires(Feature::Co2);
        let json = serde_json::to_value(rule).unwrap();
        assert_eq!(json["attribute_id"], "get_co2_level");
        assert_eq!(json["platform"], "sensor");
        assert_eq!(json["required_feature"], "co2");
        assert_eq!(json["activation"]["standard"]["min_bus_version"], 10);
    }
}
