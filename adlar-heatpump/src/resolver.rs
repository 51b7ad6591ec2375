//! Capability resolution: decide which catalog attributes a unit exposes.

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::trace;

use crate::catalog::{CapabilityRule, Catalog, Platform};
use crate::identity::{DeviceIdentity, VariantFlag};

/// Which set of version gates applies to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationPath {
    Standard,
    Variant,
}

impl ActivationPath {
    pub fn for_variant(variant: VariantFlag) -> Self {
        if variant.is_variant() {
            ActivationPath::Variant
        } else {
            ActivationPath::Standard
        }
    }
}

/// Whether a single rule activates for the given identity.
pub fn rule_applies(rule: &CapabilityRule, identity: &DeviceIdentity) -> bool {
    let bus = identity.bus_version;

    let version_ok = match ActivationPath::for_variant(identity.variant) {
        ActivationPath::Standard => rule
            .activation
            .standard()
            .is_some_and(|gate| gate.admits(bus)),
        ActivationPath::Variant => rule
            .activation
            .variant()
            .is_some_and(|gate| gate.admits(bus)),
    };

    if !version_ok || !rule.devices.contains(identity.hardware_type) {
        return false;
    }

    match rule.required_feature {
        Some(feature) => identity.features.is_present(feature),
        None => true,
    }
}

/// Evaluate every rule in the catalog against a unit's identity.
///
/// Never fails; an identity that matches nothing yields an empty map.
pub fn resolve(catalog: &Catalog, identity: &DeviceIdentity) -> ResolvedAttributeMap {
    let entries = catalog
        .iter()
        .filter(|rule| {
            let applies = rule_applies(rule, identity);
            trace!(attribute = rule.attribute_id, applies, "Evaluated capability rule");
            applies
        })
        .map(|rule| (rule.attribute_id, rule.platform))
        .collect();

    ResolvedAttributeMap { entries }
}

/// Attribute id to platform assignment for one unit, in catalog order.
///
/// Keys are unique because the catalog rejects duplicate ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAttributeMap {
    entries: Vec<(&'static str, Platform)>,
}

impl ResolvedAttributeMap {
    pub fn get(&self, attribute_id: &str) -> Option<Platform> {
        self.entries
            .iter()
            .find(|(id, _)| *id == attribute_id)
            .map(|(_, platform)| *platform)
    }

    pub fn contains(&self, attribute_id: &str) -> bool {
        self.get(attribute_id).is_some()
    }

    /// Attribute ids assigned to `platform`, in resolved order.
    pub fn assigned(&self, platform: Platform) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(_, p)| *p == platform)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Platform)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ResolvedAttributeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, platform) in &self.entries {
            map.serialize_entry(id, platform)?;
        }
        map.end()
    }
}
