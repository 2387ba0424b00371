//! ET/EH/BT/BH hybrid inverters.

use crate::goodwe::layout::{FieldSpec as F, RegisterBlockLayout};
use crate::goodwe::profile::{
    AvailabilityAction, BlockRead, CommandSpec, DerivedField, DeviceProfile, IdentitySource,
};

// units rated at or above this expose 64-bit meter counters and a second BMS
const LARGE_UNIT_RATED_POWER: f64 = 15000.0;

pub const DEVICE_INFO: RegisterBlockLayout = RegisterBlockLayout {
    name: "device_info",
    start: 35001,
    count: 40,
    fields: &[
        F::u16("RatePower"),
        F::text("INVSN", 16).skip(1),
        F::text("ModelName", 10),
        F::u16("FMVersionDSPM"),
        F::u16("FMVersionDSPS"),
        F::u16("BetaVersionDSP"),
        F::u16("FMVersionARM"),
        F::u16("BetaVersionARM"),
        F::u16("FMVersionDSPDCDC"),
        F::u16("BetaVersionDCDC"),
        F::u16("FMVersionDSPMPPT"),
        F::u16("BetaVersionMPPT"),
        F::u16("FMVersionDSPSTS"),
        F::u16("BetaVersionSTS"),
    ],
};

pub const RUNNING_DATA: RegisterBlockLayout = RegisterBlockLayout {
    name: "running_data",
    start: 35100,
    count: 123,
    fields: &[
        F::u16("PV1Voltage").div(10).absent_as(0).skip(3),
        F::u16("PV1Current").div(10).absent_as(0),
        F::u32("PV1Power"),
        F::u16("PV2Voltage").div(10).absent_as(0),
        F::u16("PV2Current").div(10).absent_as(0),
        F::u32("PV2Power"),
        F::u16("PV3Voltage").div(10).absent_as(0),
        F::u16("PV3Current").div(10).absent_as(0),
        F::u32("PV3Power"),
        F::u16("PV4Voltage").div(10).absent_as(0),
        F::u16("PV4Current").div(10).absent_as(0),
        F::u32("PV4Power"),
        F::u32("PVWorkMode"),
        F::u16("OnGridL1Voltage").div(10),
        F::i16("OnGridL1Current").div(10),
        F::u16("OnGridL1Frequency").div(100),
        F::i32("OnGridL1Power"),
        F::u16("OnGridL2Voltage").div(10),
        F::i16("OnGridL2Current").div(10),
        F::u16("OnGridL2Frequency").div(100),
        F::i32("OnGridL2Power"),
        F::u16("OnGridL3Voltage").div(10),
        F::i16("OnGridL3Current").div(10),
        F::u16("OnGridL3Frequency").div(100),
        F::i32("OnGridL3Power"),
        F::i16("GridMode"),
        F::i32("TotalInverterPower"),
        F::i32("ActivePower"),
        F::i32("ReactivePower"),
        F::i32("ApparentPower"),
        F::u16("BackupL1Voltage").div(10),
        F::u16("BackupL1Current").div(10),
        F::u16("BackupL1Frequency").div(100),
        F::i32("BackupL1Power").skip(1),
        F::u16("BackupL2Voltage").div(10),
        F::u16("BackupL2Current").div(10),
        F::u16("BackupL2Frequency").div(100),
        F::i32("BackupL2Power").skip(1),
        F::u16("BackupL3Voltage").div(10),
        F::u16("BackupL3Current").div(10),
        F::u16("BackupL3Frequency").div(100),
        F::i32("BackupL3Power").skip(1),
        F::u32("LoadL1"),
        F::u32("LoadL2"),
        F::u32("LoadL3"),
        F::i32("TotalBackupPower"),
        F::i32("TotalLoadPower"),
        F::u16("UPSLoadPercent"),
        F::u16("AirTemperature").div(10),
        F::u16("ModuleTemperature").div(10),
        F::u16("RadiatorTemperature").div(10),
        F::u16("FunctionBitValue"),
        F::u16("BUSVoltage").div(10),
        F::u16("NBUSVoltage").div(10),
        F::u16("BatteryVoltage").div(10),
        F::i16("BatteryCurrent").div(10),
        F::i32("BatteryPower"),
        F::u16("BatteryMode"),
        F::u16("WarningCode"),
        F::u16("CountryCode"),
        F::u16("WorkMode"),
        F::u16("OperationMode"),
        F::u32("ErrorMessage"),
        F::u32("TotalPVGeneration").div(10),
        F::u32("TodayPVGeneration").div(10),
        F::u32("ETotal").div(10),
        F::u32("TotalHours"),
        F::u16("EDaySell").div(10),
        F::u32("ETotalBuy").div(10),
        F::u16("EDayBuy").div(10),
        F::u32("ETotalLoad").div(10),
        F::u16("ELoadDay").div(10),
        F::u32("EBatteryCharge").div(10),
        F::u16("EChargeDay").div(10),
        F::u32("EBatteryDischarge").div(10),
        F::u16("EDischargeDay").div(10),
        F::u16("BattStrings"),
        F::u16("CPLDWarningCode"),
        F::u32("wChargerCtrlFlg"),
        F::u16("DerateFlag"),
        F::u32("DerateFrozenPower"),
        F::u32("DiagStatusH"),
        F::u32("DiagStatusL"),
    ],
};

pub const EXTRA_PV: RegisterBlockLayout = RegisterBlockLayout {
    name: "extra_pv",
    start: 35304,
    count: 44,
    fields: &[
        F::u16("PV5Voltage").div(10).absent_as(0),
        F::u16("PV5Current").div(10).absent_as(0),
        F::u16("PV6Voltage").div(10).absent_as(0),
        F::u16("PV6Current").div(10).absent_as(0),
        F::u16("MPPT1Power").absent_as(-1).skip(29),
        F::u16("MPPT2Power").absent_as(-1),
        F::u16("MPPT3Power").absent_as(-1),
        F::u16("MPPT1Current").div(10).absent_as(-1).skip(5),
        F::u16("MPPT2Current").div(10).absent_as(-1),
        F::u16("MPPT3Current").div(10).absent_as(-1),
    ],
};

pub const METER: RegisterBlockLayout = RegisterBlockLayout {
    name: "meter",
    start: 36003,
    count: 65,
    fields: &[
        F::u16("bMeterConnectStatus"),
        F::u16("MeterCommunicationStatus"),
        F::i16("MTActivePowerL1"),
        F::i16("MTActivePowerL2"),
        F::i16("MTActivePowerL3"),
        F::i16("MTTotalActivePower"),
        F::i16("MTTotalReactivePower"),
        F::i16("MeterPFL1").div(100),
        F::i16("MeterPFL2").div(100),
        F::i16("MeterPFL3").div(100),
        F::i16("MeterPowerFactor").div(100),
        F::u16("MeterFrequency").div(100),
        F::f32("MeterETotalSell"),
        F::f32("MeterETotalBuy"),
        F::i32("MeterActivePowerL1"),
        F::i32("MeterActivePowerL2"),
        F::i32("MeterActivePowerL3"),
        F::i32("MeterTotalActivePower"),
        F::i32("MeterReactivePowerL1"),
        F::i32("MeterReactivePowerL2"),
        F::i32("MeterReactivePowerL3"),
        F::i32("MeterTotalReactivePower"),
        F::i32("MeterApparentPowerL1"),
        F::i32("MeterApparentPowerL2"),
        F::i32("MeterApparentPowerL3"),
        F::i32("MeterTotalApparentPower"),
        F::u16("MeterType"),
        F::u16("MeterSoftwareVersion"),
        F::i32("MeterCT2ActivePower"),
        F::u32("CT2ETotalSell").div(100),
        F::u32("CT2ETotalBuy").div(100),
        F::u16("MeterCT2status"),
        F::u16("MeterVoltageL1").div(10),
        F::u16("MeterVoltageL2").div(10),
        F::u16("MeterVoltageL3").div(10),
        F::u16("MeterCurrentL1").div(10),
        F::u16("MeterCurrentL2").div(10),
        F::u16("MeterCurrentL3").div(10),
        F::u16("ARCFaultChannel").skip(7),
        F::u16("EzloggerProCommStatus"),
        F::u16("ARCSoftwareVersion"),
    ],
};

pub const METER_ENERGY: RegisterBlockLayout = RegisterBlockLayout {
    name: "meter_energy",
    start: 36092,
    count: 35,
    fields: &[
        F::u64("ActiveEtotalSellL1").div(100),
        F::u64("ActiveEtotalSellL2").div(100),
        F::u64("ActiveEtotalSellL3").div(100),
        F::u64("ActiveEtotalSellTotal").div(100),
        F::u64("ActiveEtotalBuyL1").div(100),
        F::u64("ActiveEtotalBuyL2").div(100),
        F::u64("ActiveEtotalBuyL3").div(100),
        F::u64("ActiveEtotalBuyTotal").div(100),
        F::u16("RealTimeClockYearMonth"),
        F::u16("RealTimeClockDayHour"),
        F::u16("RealTimeClockMinuteSecond"),
    ],
};

pub const BMS: RegisterBlockLayout = RegisterBlockLayout {
    name: "bms",
    start: 37000,
    count: 48,
    fields: &[
        F::u16("DRMStatus"),
        F::u16("BattTypeIndex"),
        F::u16("BMSStatus"),
        F::u16("BMSPackTemperature").div(10),
        F::u16("BMSChargeImax"),
        F::u16("BMSDischargeImax"),
        F::u16("BMSErrorCodeL"),
        F::u16("SOC"),
        F::u16("BMSSOH"),
        F::u16("BMSBatteryStrings"),
        F::u16("BMSWarningCodeL"),
        F::u16("BatteryProtocol"),
        F::u16("BMSErrorCodeH"),
        F::u16("BMSWarningCodeH"),
        F::u16("BMSSoftwareVersion"),
        F::u16("BatteryHardwareVersion"),
        F::u16("MaximumCellTemperatureID"),
        F::u16("MinimumCellTemperatureID"),
        F::u16("MaximumCellVoltageID"),
        F::u16("MinimumCellVoltageID"),
        F::u16("MaximumCellTemperature").div(10),
        F::u16("MinimumCellTemperature").div(10),
        F::u16("MaximumCellVoltage").div(1000),
        F::u16("MinimumCellVoltage").div(1000),
    ],
};

pub const BMS2: RegisterBlockLayout = RegisterBlockLayout {
    name: "bms2",
    start: 39000,
    count: 48,
    fields: &[
        F::u16("BMS2Status"),
        F::u16("BMS2PackTemperature").div(10),
        F::u16("BMS2ChargeImax"),
        F::u16("BMS2DischargeImax"),
        F::u16("BMS2ErrorCodeL"),
        F::u16("BMS2SOC"),
        F::u16("BMS2SOH"),
        F::u16("BMS2BatteryStrings"),
        F::u16("BMS2WarningCodeL"),
        F::u16("Battery2Protocol"),
        F::u16("BMS2ErrorCodeH"),
        F::u16("BMS2WarningCodeH"),
        F::u16("BMS2SoftwareVersion"),
        F::u16("Battery2HardwareVersion"),
        F::u16("BMS2MaximumCellTemperatureID"),
        F::u16("BMS2MinimumCellTemperatureID"),
        F::u16("BMS2MaximumCellVoltageID"),
        F::u16("BMS2MinimumCellVoltageID"),
        F::u16("BMS2MaximumCellTemperature").div(10),
        F::u16("BMS2MinimumCellTemperature").div(10),
        F::u16("BMS2MaximumCellVoltage").div(1000),
        F::u16("BMS2MinimumCellVoltage").div(1000),
    ],
};

// newer firmware keeps the authoritative energy totals here
pub const ENERGY: RegisterBlockLayout = RegisterBlockLayout {
    name: "energy",
    start: 45222,
    count: 22,
    fields: &[
        F::u32("TotalPVGeneration").div(10),
        F::u32("TodayPVGeneration").div(10),
        F::u32("ETotalSell").div(10),
        F::u32("TotalHours"),
        F::u16("EDaySell").div(10),
        F::u32("ETotalBuy").div(10),
        F::u16("EDayBuy").div(10),
        F::u32("ETotalLoad").div(10),
        F::u16("ELoadDay").div(10),
        F::u32("EBatteryCharge").div(10),
        F::u16("EChargeDay").div(10),
        F::u32("EBatteryDischarge").div(10),
        F::u16("EDischargeDay").div(10),
    ],
};

pub const BATTERY2: RegisterBlockLayout = RegisterBlockLayout {
    name: "battery2",
    start: 35262,
    count: 6,
    fields: &[
        F::u16("Battery2Voltage").div(10),
        F::i16("Battery2Current").div(10),
        F::i32("Battery2Power"),
        F::u16("Battery2Mode"),
    ],
};

pub static PROFILE: DeviceProfile = DeviceProfile {
    device_type: "ET",
    identity: IdentitySource {
        start: 35003,
        count: 8,
    },
    blocks: &[
        BlockRead::always(DEVICE_INFO).internal(),
        BlockRead::always(RUNNING_DATA),
        BlockRead::always(EXTRA_PV),
        BlockRead::always(METER),
        BlockRead::always(METER_ENERGY).when_at_least("RatePower", LARGE_UNIT_RATED_POWER),
        BlockRead::always(BMS2).when_at_least("RatePower", LARGE_UNIT_RATED_POWER),
        BlockRead::always(BMS),
        BlockRead::always(ENERGY),
        BlockRead::always(BATTERY2),
    ],
    block_pause_ms: 100,
    derived: &[
        DerivedField::product("PV1Power", "PV1Voltage", "PV1Current"),
        DerivedField::product("PV2Power", "PV2Voltage", "PV2Current"),
        DerivedField::product("PV3Power", "PV3Voltage", "PV3Current"),
        DerivedField::product("PV4Power", "PV4Voltage", "PV4Current"),
        DerivedField::product("PV5Power", "PV5Voltage", "PV5Current"),
        DerivedField::product("PV6Power", "PV6Voltage", "PV6Current"),
    ],
    limits: &[],
    commands: &[
        CommandSpec::register("socminongrid", 45356).range(0.0, 100.0),
        CommandSpec::register("socminoffgrid", 45358).range(0.0, 100.0),
        CommandSpec::register("chargeforcegrid", 47545).range(0.0, 1.0),
        CommandSpec::register("chargeforcesoc", 47546).range(0.0, 100.0),
        CommandSpec::register("chargeforcepower", 47603),
        CommandSpec::register("rapidcutoff", 45255).range(0.0, 1.0),
        CommandSpec::register("soc", 37007).read_only(),
    ],
    availability: Some(AvailabilityAction {
        command: "rapidcutoff",
        when_available: 0,
        when_lost: 1,
    }),
};
