mod common;
use common::*;

use goodwe::codec::{self, DecodedState, Value};
use goodwe::profile::{self, CommandSpec};
use goodwe_bridge::error::{CommandError, ConfigError, DecodeError};

fn running_data() -> Vec<u8> {
    (0..goodwe::dt::RUNNING_DATA.byte_len())
        .map(|i| (i * 7 % 251) as u8)
        .collect()
}

#[test]
fn decode_is_deterministic() {
    let raw = running_data();

    let a = codec::decode(&goodwe::dt::RUNNING_DATA, &raw).unwrap();
    let b = codec::decode(&goodwe::dt::RUNNING_DATA, &raw).unwrap();

    assert_eq!(a, b);
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    assert_eq!(a.len(), goodwe::dt::RUNNING_DATA.fields.len());
}

#[test]
fn every_catalog_layout_fits_its_block() {
    for device_type in profile::known_types() {
        let profile = profile::lookup(device_type).unwrap();
        for block in profile.blocks {
            let layout = &block.layout;
            assert!(
                layout.used_bytes() <= layout.byte_len(),
                "{} {} overruns",
                device_type,
                layout.name
            );
            let zeros = vec![0; layout.byte_len()];
            assert!(codec::decode(layout, &zeros).is_ok());
        }
    }
}

#[test]
fn short_response_is_a_length_error() {
    let err = codec::decode(&goodwe::et::BMS, &[0; 10]).unwrap_err();
    assert_eq!(
        err,
        DecodeError::Length {
            block: "bms",
            expected: 96,
            actual: 10
        }
    );
}

#[test]
fn scaled_command_encodes_and_reads_back() {
    static LIMIT: CommandSpec = CommandSpec::register("gridlimit", 47510).div(10);

    let request = codec::encode(&LIMIT, 55.0).unwrap();
    assert_eq!(request.register, 47510);
    assert_eq!(request.values, vec![550]);

    let value = codec::decode_register(&LIMIT, &550u16.to_be_bytes()).unwrap();
    assert_eq!(value, Value::Float(55.0));
}

#[test]
fn signed_command_encodes_twos_complement() {
    static EXPORT: CommandSpec = CommandSpec::register("export", 47509).signed();

    assert_eq!(codec::encode(&EXPORT, -2.0).unwrap().values, vec![0xFFFE]);
    assert_eq!(
        codec::decode_register(&EXPORT, &[0xFF, 0xFE]).unwrap(),
        Value::Signed(-2)
    );
    assert!(matches!(
        codec::encode(&EXPORT, 40000.0),
        Err(CommandError::ValueOutOfRange { .. })
    ));
}

#[test]
fn encode_rejects_what_does_not_fit() {
    let et = &goodwe::et::PROFILE;

    assert_eq!(
        codec::encode(et.command("soc").unwrap(), 10.0),
        Err(CommandError::NotWritable("soc".to_string()))
    );
    assert!(matches!(
        codec::encode(et.command("socminongrid").unwrap(), 101.0),
        Err(CommandError::ValueOutOfRange { .. })
    ));
    assert!(matches!(
        codec::encode(et.command("chargeforcepower").unwrap(), 70000.0),
        Err(CommandError::ValueOutOfRange { .. })
    ));
    assert!(matches!(
        codec::encode(et.command("chargeforcepower").unwrap(), f64::NAN),
        Err(CommandError::ValueOutOfRange { .. })
    ));
    assert_eq!(
        et.command("nope").unwrap_err(),
        CommandError::UnknownCommand("nope".to_string())
    );
}

#[test]
fn merge_keeps_union_and_later_wins() {
    let mut a = DecodedState::new();
    a.insert("ETotal", Value::Float(1.0));
    a.insert("SOC", Value::Unsigned(50));

    let mut b = DecodedState::new();
    b.insert("ETotal", Value::Float(2.0));
    b.insert("PV1Voltage", Value::Float(300.0));

    a.merge(b);

    assert_eq!(a.len(), 3);
    assert_eq!(a.get("ETotal"), Some(&Value::Float(2.0)));
    assert_eq!(a.get("SOC"), Some(&Value::Unsigned(50)));
    assert!(a.contains("PV1Voltage"));
}

#[test]
fn sixty_four_bit_counters() {
    let mut raw = vec![0u8; goodwe::et::METER_ENERGY.byte_len()];
    raw[..8].copy_from_slice(&123_456_789_012u64.to_be_bytes());

    let state = codec::decode(&goodwe::et::METER_ENERGY, &raw).unwrap();
    assert_eq!(state.get_f64("ActiveEtotalSellL1"), Some(1_234_567_890.12));
    assert_eq!(state.get_f64("ActiveEtotalSellL2"), Some(0.0));

    // past 2^53 the counter must not be rounded before scaling
    raw[..8].copy_from_slice(&0x0020_0000_0000_0001u64.to_be_bytes());
    let state = codec::decode(&goodwe::et::METER_ENERGY, &raw).unwrap();
    assert_eq!(
        state.get_f64("ActiveEtotalSellL1"),
        Some(90_071_992_547_409.93)
    );
}

#[test]
fn values_finer_than_register_resolution_are_rejected() {
    let et = &goodwe::et::PROFILE;

    assert_eq!(
        codec::encode(et.command("socminongrid").unwrap(), 55.7),
        Err(CommandError::InvalidPayload("55.7".to_string()))
    );
    assert_eq!(
        codec::encode(et.command("socminongrid").unwrap(), 55.0)
            .unwrap()
            .values,
        vec![55]
    );

    static LIMIT: CommandSpec = CommandSpec::register("gridlimit", 47510).div(10);
    assert_eq!(codec::encode(&LIMIT, 1.1).unwrap().values, vec![11]);
    assert!(codec::encode(&LIMIT, 1.15).is_err());
}

#[test]
fn catalog_lookup() {
    assert_eq!(profile::lookup("et").unwrap().device_type, "ET");
    assert_eq!(profile::lookup("DT").unwrap().device_type, "DT");
    assert_eq!(
        profile::lookup("XS").unwrap_err(),
        ConfigError::UnknownDeviceType("XS".to_string())
    );
}
