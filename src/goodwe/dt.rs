//! DT/D-NS/XS string inverters. A single running-data block, no battery.

use crate::goodwe::layout::{FieldSpec as F, RegisterBlockLayout};
use crate::goodwe::profile::{
    AvailabilityAction, BlockRead, CommandSpec, DerivedField, DeviceProfile, IdentitySource,
    Limit,
};

pub const RUNNING_DATA: RegisterBlockLayout = RegisterBlockLayout {
    name: "running_data",
    start: 0x300,
    count: 0x21,
    fields: &[
        F::u16("PV1Voltage").div(10),
        F::u16("PV2Voltage").div(10),
        F::u16("PV1Current").div(10),
        F::u16("PV2Current").div(10),
        F::u16("GridL1Voltage").div(10),
        F::u16("GridL2Voltage").div(10),
        F::u16("GridL3Voltage").div(10),
        F::u16("GridL1Current").div(10),
        F::u16("GridL2Current").div(10),
        F::u16("GridL3Current").div(10),
        F::u16("GridL1Frequency").div(100),
        F::u16("GridL2Frequency").div(100),
        F::u16("GridL3Frequency").div(100),
        F::u16("GridFeedingPowerL"),
        F::u16("WorkMode"),
        F::u16("Temperature").div(10),
        F::u32("ErrorMessage"),
        F::u32("ETotal").div(10),
        F::u32("HTotal").div(10),
        F::u16("Firmware"),
        F::u16("Warning"),
        F::u16("PV2FaultValue").div(10),
        F::u16("FunctionsValue"),
        F::u16("Line2VfaultValue").div(10),
        F::u16("Line3VfaultValue").div(10),
        F::u16("BUSVoltage").div(10),
        F::u16("NBUSVoltage").div(10),
        F::u16("Line3FfaultValue").div(100),
        F::u16("SafetyCountry"),
        F::u16("EDay").div(10),
    ],
};

pub static PROFILE: DeviceProfile = DeviceProfile {
    device_type: "DT",
    identity: IdentitySource {
        start: 0x200,
        count: 8,
    },
    blocks: &[BlockRead::always(RUNNING_DATA)],
    block_pause_ms: 50,
    derived: &[
        DerivedField::product("PV1Power", "PV1Voltage", "PV1Current"),
        DerivedField::product("PV2Power", "PV2Voltage", "PV2Current"),
    ],
    // the RS485 bridge on these units occasionally returns shifted frames
    limits: &[
        Limit {
            field: "PV1Voltage",
            below: 1200.0,
        },
        Limit {
            field: "PV2Voltage",
            below: 1200.0,
        },
        Limit {
            field: "PV1Current",
            below: 120.0,
        },
        Limit {
            field: "PV2Current",
            below: 120.0,
        },
    ],
    commands: &[CommandSpec::trigger("rapidcutoff", 120, 121)],
    availability: Some(AvailabilityAction {
        command: "rapidcutoff",
        when_available: 1,
        when_lost: 0,
    }),
};
