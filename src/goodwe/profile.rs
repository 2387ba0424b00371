//! Device profiles: per inverter family, which blocks to read, how to decode them, and
//! which commands map to which control registers.

use crate::error::{CommandError, ConfigError, DecodeError};
use crate::goodwe::codec::{DecodedState, Value};
use crate::goodwe::layout::{FieldSpec, RegisterBlockLayout};
use crate::goodwe::{dt, et};

/// Where the serial number lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentitySource {
    pub start: u16,
    pub count: u16,
}

/// Read a block only when a field decoded earlier in the same cycle is at least `min`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub field: &'static str,
    pub min: f64,
}

impl Condition {
    pub fn holds(&self, seen: &DecodedState) -> bool {
        seen.get_f64(self.field).map_or(false, |v| v >= self.min)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockRead {
    pub layout: RegisterBlockLayout,
    pub condition: Option<Condition>,
    /// false: decoded for conditions only, not published
    pub publish: bool,
}

impl BlockRead {
    pub const fn always(layout: RegisterBlockLayout) -> Self {
        Self {
            layout,
            condition: None,
            publish: true,
        }
    }

    pub const fn when_at_least(mut self, field: &'static str, min: f64) -> Self {
        self.condition = Some(Condition { field, min });
        self
    }

    pub const fn internal(mut self) -> Self {
        self.publish = false;
        self
    }
}

/// `name = trunc(lhs * rhs)`, computed after all blocks of a cycle are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedField {
    pub name: &'static str,
    pub lhs: &'static str,
    pub rhs: &'static str,
}

impl DerivedField {
    pub const fn product(name: &'static str, lhs: &'static str, rhs: &'static str) -> Self {
        Self { name, lhs, rhs }
    }
}

/// Upper bound past which a decoded value is considered corrupt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limit {
    pub field: &'static str,
    pub below: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTarget {
    Register { address: u16, writable: bool },
    /// Writes 0 to `when_zero` if the requested value is 0, else to `otherwise`.
    Trigger { when_zero: u16, otherwise: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub target: CommandTarget,
    pub range: Option<(f64, f64)>,
    /// single-register encoding used for writes and query read-back
    pub field: FieldSpec,
}

impl CommandSpec {
    pub const fn register(name: &'static str, address: u16) -> Self {
        Self {
            name,
            target: CommandTarget::Register {
                address,
                writable: true,
            },
            range: None,
            field: FieldSpec::u16(name),
        }
    }

    pub const fn trigger(name: &'static str, when_zero: u16, otherwise: u16) -> Self {
        Self {
            name,
            target: CommandTarget::Trigger {
                when_zero,
                otherwise,
            },
            range: None,
            field: FieldSpec::u16(name),
        }
    }

    pub const fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub const fn read_only(mut self) -> Self {
        if let CommandTarget::Register { address, .. } = self.target {
            self.target = CommandTarget::Register {
                address,
                writable: false,
            };
        }
        self
    }

    pub const fn signed(mut self) -> Self {
        self.field = FieldSpec::i16(self.name).div(self.field.divisor);
        self
    }

    pub const fn div(mut self, divisor: u32) -> Self {
        self.field = self.field.div(divisor);
        self
    }
}

/// What to do when the grid availability signal changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityAction {
    /// command whose result topic reports the outcome
    pub command: &'static str,
    /// value fed to that command when the grid is present / lost
    pub when_available: u16,
    pub when_lost: u16,
}

impl AvailabilityAction {
    pub fn value(&self, available: bool) -> u16 {
        if available {
            self.when_available
        } else {
            self.when_lost
        }
    }
}

#[derive(Debug)]
pub struct DeviceProfile {
    pub device_type: &'static str,
    pub identity: IdentitySource,
    pub blocks: &'static [BlockRead],
    /// device turnaround between consecutive block reads
    pub block_pause_ms: u64,
    pub derived: &'static [DerivedField],
    pub limits: &'static [Limit],
    pub commands: &'static [CommandSpec],
    pub availability: Option<AvailabilityAction>,
}

impl DeviceProfile {
    pub fn command(&self, name: &str) -> Result<&CommandSpec, CommandError> {
        self.commands
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))
    }

    pub fn block_pause(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.block_pause_ms)
    }

    /// Fill in derived fields. Skipped when an input is missing.
    pub fn derive(&self, state: &mut DecodedState) {
        for d in self.derived {
            if let (Some(l), Some(r)) = (state.get_f64(d.lhs), state.get_f64(d.rhs)) {
                state.insert(d.name, Value::Signed((l * r).trunc() as i64));
            }
        }
    }

    pub fn check_limits(&self, state: &DecodedState) -> Result<(), DecodeError> {
        for limit in self.limits {
            if let Some(value) = state.get_f64(limit.field) {
                if value >= limit.below {
                    return Err(DecodeError::Implausible {
                        field: limit.field,
                        value,
                        limit: limit.below,
                    });
                }
            }
        }

        Ok(())
    }
}

static CATALOG: [&DeviceProfile; 2] = [&et::PROFILE, &dt::PROFILE];

pub fn lookup(device_type: &str) -> Result<&'static DeviceProfile, ConfigError> {
    CATALOG
        .iter()
        .copied()
        .find(|p| p.device_type.eq_ignore_ascii_case(device_type))
        .ok_or_else(|| ConfigError::UnknownDeviceType(device_type.to_string()))
}

pub fn known_types() -> impl Iterator<Item = &'static str> {
    CATALOG.iter().map(|p| p.device_type)
}
