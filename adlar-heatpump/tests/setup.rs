//! Device setup against scripted controllers.

use adlar_heatpump::catalog::{Catalog, Platform};
use adlar_heatpump::device::{Device, SetupReason};
use adlar_heatpump::mock::MockTransport;
use adlar_heatpump::registers;
use adlar_heatpump::registry::DeviceRegistry;

fn catalog() -> Catalog {
    Catalog::builtin().unwrap()
}

/// A unit that answers every identity register setup may ask for.
fn unit(hardware_type: u16, bus_version: u16) -> MockTransport {
    MockTransport::controller(hardware_type, bus_version)
        .with_value(registers::CO2_PRESENT, 0)
        .with_value(registers::HARDWARE_VERSION, 3)
}

#[tokio::test]
async fn unknown_hardware_is_rejected_and_closed() {
    let transport = MockTransport::controller(999, 12);
    let handle = transport.handle();

    let err = Device::initialize("hp", transport, &catalog())
        .await
        .unwrap_err();

    assert_eq!(err.reason(), SetupReason::UnrecognizedHardware);
    assert_eq!(err.unsupported().map(|e| e.0.code()), Some(999));
    assert!(handle.was_closed());
    assert!(!handle.was_read(registers::BUS_VERSION));
}

#[tokio::test]
async fn missing_hardware_value_is_unrecognized() {
    let transport = MockTransport::new()
        .with_empty(registers::CONTROL_TYPE)
        .with_value(registers::BUS_VERSION, 12);
    let handle = transport.handle();

    let err = Device::initialize("hp", transport, &catalog())
        .await
        .unwrap_err();

    assert_eq!(err.reason(), SetupReason::UnrecognizedHardware);
    assert!(err.unsupported().is_none());
    assert!(handle.was_closed());
}

#[tokio::test]
async fn missing_bus_version_closes_transport() {
    let transport = unit(10, 12).with_empty(registers::BUS_VERSION);
    let handle = transport.handle();

    let err = Device::initialize("hp", transport, &catalog())
        .await
        .unwrap_err();

    assert_eq!(err.reason(), SetupReason::MissingBusVersion);
    assert!(handle.was_closed());
}

#[tokio::test]
async fn connect_failure_closes_transport() {
    let transport = unit(10, 12).refusing_connect();
    let handle = transport.handle();

    let err = Device::initialize("hp", transport, &catalog())
        .await
        .unwrap_err();

    assert_eq!(err.reason(), SetupReason::Transport);
    assert_eq!(handle.connect_calls(), 1);
    assert_eq!(handle.close_calls(), 1);
    assert!(handle.reads().is_empty());
}

#[tokio::test]
async fn read_failure_is_transport_error() {
    let transport = unit(10, 12).with_failure(registers::APP_VERSION_MINOR);
    let handle = transport.handle();

    let err = Device::initialize("hp", transport, &catalog())
        .await
        .unwrap_err();

    assert_eq!(err.reason(), SetupReason::Transport);
    assert!(handle.was_closed());
}

#[tokio::test]
async fn standard_unit_exposes_standard_rules() {
    let catalog = catalog();
    let transport = unit(10, 12);
    let handle = transport.handle();

    let device = Device::initialize("Nilan", transport, &catalog)
        .await
        .unwrap();

    assert_eq!(device.device_type(), "VP 18");
    assert_eq!(device.software_version(), Some("2.1.4"));
    assert_eq!(device.hardware_version(), Some("3"));
    assert!(!handle.was_read(registers::AIR_GEO_TYPE));
    assert!(handle.is_connected());

    let sensors = device.get_assigned(Platform::Sensor);
    assert!(sensors.contains(&"get_t18_supply_temperature_after_heater"));
    assert!(sensors.contains(&"get_compressor_power"));
    assert!(!sensors.contains(&"get_compressor_capacity"));
    assert!(!sensors.contains(&"get_t13_return_temperature"));
    assert!(!sensors.contains(&"get_co2_level"));

    let info = device.device_info();
    assert_eq!(info.identifier, "NilanVP 18");
    assert_eq!(info.manufacturer, "AdlarCastra");
    assert_eq!(info.suggested_area, "Groundfloor");
}

#[tokio::test]
async fn excluded_bus_version_drops_rule() {
    let device = Device::initialize("hp", unit(10, 15), &catalog())
        .await
        .unwrap();

    let sensors = device.get_assigned(Platform::Sensor);
    assert!(!sensors.contains(&"get_t18_supply_temperature_after_heater"));
    assert!(sensors.contains(&"get_t17_preheater_temperature"));
}

#[tokio::test]
async fn compact_p_air_uses_variant_path() {
    let transport = unit(44, 12).with_value(registers::AIR_GEO_TYPE, 1);
    let handle = transport.handle();

    let device = Device::initialize("hp", transport, &catalog())
        .await
        .unwrap();

    assert_eq!(device.device_type(), "COMPACT P AIR");
    assert!(handle.was_read(registers::AIR_GEO_TYPE));

    let sensors = device.get_assigned(Platform::Sensor);
    assert!(sensors.contains(&"get_t13_return_temperature"));
    assert!(sensors.contains(&"get_central_heating_power"));
    // Rules without a variant gate never apply to variant units
    assert!(!sensors.contains(&"get_t2_inlet_temperature"));

    assert!(
        device
            .get_assigned(Platform::Switch)
            .contains(&"set_central_heating_enabled")
    );
    assert!(
        !device
            .get_assigned(Platform::Select)
            .contains(&"set_central_heating_mode")
    );
}

#[tokio::test]
async fn unrecognized_variant_code_uses_variant_path_without_suffix() {
    let transport = unit(44, 12).with_value(registers::AIR_GEO_TYPE, 3);
    let handle = transport.handle();

    let device = Device::initialize("hp", transport, &catalog())
        .await
        .unwrap();

    assert_eq!(device.device_type(), "COMPACT P");
    assert!(device.identity().variant.is_variant());
    assert!(handle.was_read(registers::CO2_PRESENT));

    let sensors = device.get_assigned(Platform::Sensor);
    assert!(sensors.contains(&"get_t13_return_temperature"));
    assert!(!sensors.contains(&"get_t2_inlet_temperature"));
}

#[tokio::test]
async fn hardware_version_not_read_when_not_resolved() {
    // Old standard firmware: the hardware version capability starts at bus 8
    let transport = MockTransport::controller(10, 6);
    let handle = transport.handle();

    let device = Device::initialize("hp", transport, &catalog())
        .await
        .unwrap();

    assert!(device.hardware_version().is_none());
    assert!(!device.attributes().contains("get_controller_hardware_version"));
    assert!(!handle.was_read(registers::HARDWARE_VERSION));
    assert!(!handle.was_read(registers::CO2_PRESENT));
    assert!(
        device
            .get_assigned(Platform::Sensor)
            .contains(&"get_compressor_capacity")
    );
}

#[tokio::test]
async fn co2_rules_follow_sensor_presence() {
    let with_co2 = unit(10, 12).with_value(registers::CO2_PRESENT, 1);
    let device = Device::initialize("hp", with_co2, &catalog())
        .await
        .unwrap();

    assert!(device.identity().features.co2);
    assert!(device.attributes().contains("get_co2_level"));
    assert_eq!(
        device.attributes().get("set_air_quality_control_enabled"),
        Some(Platform::Switch)
    );

    let without = Device::initialize("hp", unit(10, 12), &catalog())
        .await
        .unwrap();
    assert!(!without.attributes().contains("get_co2_level"));
    assert!(!without.attributes().contains("set_air_quality_control_enabled"));
}

#[tokio::test]
async fn empty_platform_yields_empty_list() {
    // VPL 15 with old firmware: no hot water, no compressor, no variant rules
    let device = Device::initialize("hp", MockTransport::controller(9, 0), &catalog())
        .await
        .unwrap();

    let switches = device.get_assigned(Platform::Switch);
    assert!(!switches.contains(&"set_cooling_enabled"));
    assert!(!switches.contains(&"set_hot_water_legionella_enabled"));

    let empty = Catalog::new(
        catalog()
            .iter()
            .filter(|rule| rule.platform != Platform::Select)
            .copied(),
    )
    .unwrap();
    let device = Device::initialize("hp", unit(10, 12), &empty)
        .await
        .unwrap();
    assert!(device.get_assigned(Platform::Select).is_empty());
    assert!(!device.get_assigned(Platform::Sensor).is_empty());
}

#[tokio::test]
async fn concurrent_setup_of_several_units() {
    let catalog = std::sync::Arc::new(catalog());
    let mut tasks = Vec::new();

    for (i, (hardware_type, bus_version)) in [(10, 12), (44, 12), (13, 8)].into_iter().enumerate() {
        let catalog = std::sync::Arc::clone(&catalog);
        let transport = unit(hardware_type, bus_version).with_value(registers::AIR_GEO_TYPE, 2);
        tasks.push(tokio::spawn(async move {
            let device = Device::initialize(format!("hp{}", i), transport, &catalog).await;
            (format!("entry{}", i), device)
        }));
    }

    let mut registry = DeviceRegistry::new();
    for task in tasks {
        let (entry_id, device) = task.await.unwrap();
        registry.insert(entry_id, device.unwrap());
    }

    assert_eq!(registry.len(), 3);
    assert_eq!(
        registry.get("entry1").map(|d| d.device_type()),
        Some("COMPACT P GEO")
    );
    assert_eq!(
        registry.get("entry2").map(|d| d.device_type()),
        Some("COMBI 300")
    );

    registry.unload_all().await;
    assert!(registry.is_empty());
}
