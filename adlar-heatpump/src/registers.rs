//! CTS602 controller registers read during device setup.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Modbus register table a value lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterKind {
    /// Input registers (read-only, 16-bit)
    Input,
    /// Holding registers (read/write, 16-bit)
    Holding,
}

impl RegisterKind {
    /// Return the string name for this register kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterKind::Input => "input",
            RegisterKind::Holding => "holding",
        }
    }
}

/// A single 16-bit register address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register {
    pub kind: RegisterKind,
    pub address: u16,
}

impl Register {
    pub const fn input(address: u16) -> Self {
        Self {
            kind: RegisterKind::Input,
            address,
        }
    }

    pub const fn holding(address: u16) -> Self {
        Self {
            kind: RegisterKind::Holding,
            address,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.address)
    }
}

/// Modbus protocol version implemented by the controller firmware.
pub const BUS_VERSION: Register = Register::input(0);

/// Application firmware version, split over three registers.
pub const APP_VERSION_MAJOR: Register = Register::input(1);
pub const APP_VERSION_MINOR: Register = Register::input(2);
pub const APP_VERSION_RELEASE: Register = Register::input(3);

/// Controller model code.
pub const CONTROL_TYPE: Register = Register::input(1000);

/// Controller board hardware revision.
pub const HARDWARE_VERSION: Register = Register::input(1001);

/// AIR/GEO sub-model selector on variant-capable units (0 none, 1 air, 2 geo).
pub const AIR_GEO_TYPE: Register = Register::holding(1050);

/// Non-zero when a CO2 sensor is fitted.
pub const CO2_PRESENT: Register = Register::holding(1052);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_display() {
        assert_eq!(BUS_VERSION.to_string(), "input:0");
        assert_eq!(AIR_GEO_TYPE.to_string(), "holding:1050");
    }

    #[test]
    fn test_probe_registers_are_distinct() {
        let all = [
            BUS_VERSION,
            APP_VERSION_MAJOR,
            APP_VERSION_MINOR,
            APP_VERSION_RELEASE,
            CONTROL_TYPE,
            HARDWARE_VERSION,
            AIR_GEO_TYPE,
            CO2_PRESENT,
        ];
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }
}
