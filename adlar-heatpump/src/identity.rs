//! Identity of a connected controller: model, bus version, AIR/GEO variant
//! and fitted add-ons.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol/firmware version reported over the field bus.
pub type BusVersion = u16;

/// Bus version from which the firmware implements the add-on presence registers.
pub const FEATURE_PROBE_MIN_BUS_VERSION: BusVersion = 10;

/// Controller model codes known to this integration, with display names.
pub const DEVICE_TYPES: &[(u16, &str)] = &[
    (2, "COMFORT"),
    (3, "COMFORT 300"),
    (4, "COMFORT 450"),
    (5, "COMFORT 600"),
    (6, "COMFORT 1200"),
    (9, "VPL 15"),
    (10, "VP 18"),
    (13, "COMBI 300"),
    (17, "COMPACT"),
    (18, "COMPACT SP"),
    (19, "COMFORT 300 TOP"),
    (21, "VPL 28"),
    (26, "COMBI 302"),
    (27, "COMBI 302 T"),
    (29, "COMBI 302 POLAR"),
    (31, "VP 18 CWH"),
    (38, "COMBI 302 TOP"),
    (44, "COMPACT P"),
    (45, "COMPACT S"),
];

/// Models that ship as AIR or GEO sub-variants.
pub const VARIANT_CAPABLE_TYPES: &[u16] = &[44];

/// Manufacturer's numeric controller model code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareType(u16);

impl HardwareType {
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Display name of the model, if the code is known.
    pub fn model_name(&self) -> Option<&'static str> {
        DEVICE_TYPES
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, name)| *name)
    }

    pub fn is_supported(&self) -> bool {
        self.model_name().is_some()
    }

    /// Whether the unit needs the secondary AIR/GEO probe.
    pub fn is_variant_capable(&self) -> bool {
        VARIANT_CAPABLE_TYPES.contains(&self.0)
    }
}

impl fmt::Display for HardwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.model_name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "unknown ({})", self.0),
        }
    }
}

/// AIR/GEO sub-model of a variant-capable unit.
///
/// Any answer other than zero puts the unit on the variant path; only the
/// known codes carry a display suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantFlag {
    #[default]
    None,
    Air,
    Geo,
    /// Non-zero code this integration has no name for, or no value at all
    Unrecognized,
}

impl VariantFlag {
    /// Decode the raw AIR/GEO register value.
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => VariantFlag::None,
            1 => VariantFlag::Air,
            2 => VariantFlag::Geo,
            _ => VariantFlag::Unrecognized,
        }
    }

    pub fn is_variant(&self) -> bool {
        *self != VariantFlag::None
    }

    /// Suffix appended to the model name for display.
    pub fn display_suffix(&self) -> Option<&'static str> {
        match self {
            VariantFlag::None | VariantFlag::Unrecognized => None,
            VariantFlag::Air => Some(" AIR"),
            VariantFlag::Geo => Some(" GEO"),
        }
    }
}

/// Optional hardware add-ons that gate capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Co2,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Co2 => "co2",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which optional add-ons were found on the unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeaturePresence {
    pub co2: bool,
}

impl FeaturePresence {
    pub fn is_present(&self, feature: Feature) -> bool {
        match feature {
            Feature::Co2 => self.co2,
        }
    }
}

/// Everything the resolver needs to know about a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub hardware_type: HardwareType,
    pub bus_version: BusVersion,
    pub variant: VariantFlag,
    pub features: FeaturePresence,
}

impl DeviceIdentity {
    /// Identity of a standard (non-variant) unit without add-ons.
    pub fn new(hardware_type: HardwareType, bus_version: BusVersion) -> Self {
        Self {
            hardware_type,
            bus_version,
            variant: VariantFlag::None,
            features: FeaturePresence::default(),
        }
    }

    pub fn with_variant(mut self, variant: VariantFlag) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_features(mut self, features: FeaturePresence) -> Self {
        self.features = features;
        self
    }

    /// Model name with the AIR/GEO suffix, e.g. `COMPACT P AIR`.
    pub fn display_type(&self) -> String {
        let base = self.hardware_type.model_name().unwrap_or("UNKNOWN");
        match self.variant.display_suffix() {
            Some(suffix) => format!("{}{}", base, suffix),
            None => base.to_string(),
        }
    }
}
