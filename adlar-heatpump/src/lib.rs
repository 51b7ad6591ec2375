//! Modbus bridge for Adlar/Nilan CTS602 heat pumps.
//!
//! On setup each configured unit is probed for its model code, bus
//! protocol version, AIR/GEO variant and fitted add-ons. That identity is
//! matched against a catalog of capability rules to decide which
//! attributes the unit exposes and under which host platform.
//!
//! - [`catalog`] - Capability rules and the built-in rule table
//! - [`probe`] - Identity register reads
//! - [`resolver`] - Identity to attribute map
//! - [`device`] - Setup facade and device descriptor
//! - [`registry`] - Initialized devices keyed by entry id
//! - [`entry`] - Persisted entry records and their migration
//! - [`transport`] - Modbus TCP/RTU transport
//! - [`publish`] - Zenoh publication of descriptors and status

pub mod catalog;
pub mod config;
pub mod device;
pub mod entry;
pub mod identity;
pub mod mock;
pub mod probe;
pub mod publish;
pub mod registers;
pub mod registry;
pub mod resolver;
pub mod transport;

pub use catalog::{Catalog, CatalogError, CapabilityRule, Platform};
pub use device::{Device, DeviceInfo, SetupError, SetupReason, UnsupportedDeviceError};
pub use identity::{DeviceIdentity, FeaturePresence, HardwareType, VariantFlag};
pub use registry::DeviceRegistry;
pub use resolver::{ResolvedAttributeMap, resolve};
pub use transport::{ModbusTransport, Transport, TransportError, TransportOptions};
