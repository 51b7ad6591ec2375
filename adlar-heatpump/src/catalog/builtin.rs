//! Capability table for the CTS602 controller family.

use super::{Activation, CapabilityRule, Platform, StandardGate, SupportedDevices, VariantGate};
use crate::identity::Feature;

use super::Platform::{Select, Sensor, Switch};
use super::SupportedDevices::{All, Only};

/// Models with a compressor circuit.
const HEAT_PUMPS: SupportedDevices = Only(&[10, 13, 17, 18, 26, 27, 29, 31, 38, 44, 45]);

/// Models with a domestic hot water tank.
const HOT_WATER: SupportedDevices = Only(&[13, 17, 18, 26, 27, 29, 38, 44]);

/// Compact P family, sold as AIR and GEO units.
const COMPACT_P: SupportedDevices = Only(&[44]);

const fn standard(gate: StandardGate) -> Activation {
    Activation::Standard(gate)
}

const fn variant(min: u16) -> Activation {
    Activation::Variant(VariantGate::since(min))
}

const fn both(min: u16, min_variant: u16) -> Activation {
    Activation::Both {
        standard: StandardGate::since(min),
        variant: VariantGate::since(min_variant),
    }
}

const fn since(min: u16) -> StandardGate {
    StandardGate::since(min)
}

const fn rule(
    id: &'static str,
    platform: Platform,
    devices: SupportedDevices,
    activation: Activation,
) -> CapabilityRule {
    CapabilityRule::new(id, platform, devices, activation)
}

pub static BUILTIN_RULES: &[CapabilityRule] = &[
    // Controller
    rule("get_controller_hardware_version", Sensor, All, both(8, 0)),
    rule("get_t0_controller_temperature", Sensor, All, both(0, 0)),
    rule("get_alarm_count", Sensor, All, both(0, 0)),
    rule("get_alarm_1_code", Sensor, All, both(0, 0)),
    rule("get_alarm_2_code", Sensor, All, both(0, 0)),
    rule("get_alarm_3_code", Sensor, All, both(0, 0)),
    // Air temperatures
    rule("get_t1_intake_temperature", Sensor, All, both(0, 0)),
    rule("get_t2_inlet_temperature", Sensor, All, standard(since(0))),
    rule("get_t3_exhaust_temperature", Sensor, All, both(0, 0)),
    rule("get_t4_outlet_temperature", Sensor, All, both(0, 0)),
    rule("get_t7_inlet_temperature_after_heater", Sensor, All, standard(since(0))),
    rule("get_t8_outdoor_temperature", Sensor, All, both(0, 0)),
    rule("get_t10_external_temperature", Sensor, All, standard(since(5))),
    rule("get_t15_room_temperature", Sensor, All, standard(since(2))),
    rule("get_t17_preheater_temperature", Sensor, All, standard(since(10))),
    rule(
        "get_t18_supply_temperature_after_heater",
        Sensor,
        All,
        standard(since(10).excluding(&[15])),
    ),
    // Refrigerant circuit
    rule("get_t5_condenser_temperature", Sensor, HEAT_PUMPS, both(0, 0)),
    rule("get_t6_evaporator_temperature", Sensor, HEAT_PUMPS, both(0, 0)),
    rule("get_compressor_capacity", Sensor, HEAT_PUMPS, standard(since(0).below(10))),
    rule("get_compressor_power", Sensor, HEAT_PUMPS, both(10, 10)),
    rule("get_defrost_state", Sensor, HEAT_PUMPS, both(0, 0)),
    // Hot water
    rule("get_t11_top_tank_temperature", Sensor, HOT_WATER, both(0, 0)),
    rule("get_t12_bottom_tank_temperature", Sensor, HOT_WATER, both(0, 0)),
    rule(
        "get_t16_sacrificial_anode_temperature",
        Sensor,
        HOT_WATER,
        standard(since(4).excluding(&[7, 15])),
    ),
    // Central heating (Compact P AIR/GEO)
    rule("get_t13_return_temperature", Sensor, COMPACT_P, variant(10)),
    rule("get_t14_supply_temperature", Sensor, COMPACT_P, variant(10)),
    rule("get_brine_inlet_temperature", Sensor, COMPACT_P, variant(10)),
    rule("get_central_heating_power", Sensor, COMPACT_P, variant(12)),
    // Air quality
    rule("get_humidity", Sensor, All, both(0, 0)),
    rule("get_co2_level", Sensor, All, both(10, 0)).requires(Feature::Co2),
    rule("get_heat_exchanger_efficiency", Sensor, All, standard(since(12))),
    // Fans and filters
    rule("get_supply_fan_speed", Sensor, All, both(0, 0)),
    rule("get_exhaust_fan_speed", Sensor, All, both(0, 0)),
    rule("get_bypass_flap_state", Sensor, All, standard(since(0))),
    rule("get_days_to_filter_change", Sensor, All, standard(since(6))),
    // Switches
    rule("set_user_function_enabled", Switch, All, both(0, 0)),
    rule("set_cooling_enabled", Switch, HEAT_PUMPS, standard(since(0))),
    rule("set_electric_heater_enabled", Switch, All, standard(since(0).below(20))),
    rule("set_hot_water_legionella_enabled", Switch, HOT_WATER, both(3, 0)),
    rule("set_central_heating_enabled", Switch, COMPACT_P, variant(10)),
    rule(
        "set_air_quality_control_enabled",
        Switch,
        All,
        standard(since(10)),
    )
    .requires(Feature::Co2),
    // Selects
    rule("set_ventilation_step", Select, All, both(0, 0)),
    rule("set_operation_mode", Select, All, both(0, 0)),
    rule("set_air_exchange_mode", Select, All, standard(since(0).below(10))),
    rule("set_user_function_mode", Select, All, standard(since(5).excluding(&[7]))),
    rule("set_bypass_mode", Select, All, standard(since(20))),
    rule("set_central_heating_mode", Select, COMPACT_P, variant(14)),
];
