//! Pure decode/encode between register images and named values.

use std::collections::BTreeMap;

use nom::bytes::complete::take;
use nom::number::complete::{be_f32, be_u16, be_u32, be_u64};
use nom::IResult;
use serde::Serialize;

use crate::error::{CommandError, DecodeError};
use crate::goodwe::layout::{FieldKind, FieldSpec, RegisterBlockLayout};
use crate::goodwe::profile::{CommandSpec, CommandTarget};

// beyond this an i128 -> f64 conversion is no longer exact
const F64_EXACT: i128 = 1 << 53;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Unsigned(v) => Some(*v as f64),
            Self::Signed(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsigned(v) => write!(f, "{}", v),
            Self::Signed(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Field name -> value for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DecodedState(BTreeMap<String, Value>);

impl DecodedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Union of both states. Names present in both take `other`'s value.
    pub fn merge(&mut self, other: DecodedState) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Clone, Copy)]
enum Raw<'a> {
    Unsigned(u64),
    Signed(i64, u64),
    Float(f32),
    Text(&'a [u8]),
}

fn parse_raw<'a>(input: &'a [u8], field: &FieldSpec) -> IResult<&'a [u8], Raw<'a>> {
    let (input, _) = take(field.skip_before)(input)?;

    match field.kind {
        FieldKind::U16 => {
            let (input, v) = be_u16(input)?;
            Ok((input, Raw::Unsigned(v as u64)))
        }
        FieldKind::I16 => {
            let (input, v) = be_u16(input)?;
            Ok((input, Raw::Signed(v as i16 as i64, v as u64)))
        }
        FieldKind::U32 => {
            let (input, v) = be_u32(input)?;
            Ok((input, Raw::Unsigned(v as u64)))
        }
        FieldKind::I32 => {
            let (input, v) = be_u32(input)?;
            Ok((input, Raw::Signed(v as i32 as i64, v as u64)))
        }
        FieldKind::U64 => {
            let (input, v) = be_u64(input)?;
            Ok((input, Raw::Unsigned(v)))
        }
        FieldKind::F32 => {
            let (input, v) = be_f32(input)?;
            Ok((input, Raw::Float(v)))
        }
        FieldKind::Text(len) => {
            let (input, v) = take(len)(input)?;
            Ok((input, Raw::Text(v)))
        }
    }
}

fn scale(raw: i128, divisor: u32) -> Value {
    if divisor <= 1 {
        return if raw < 0 {
            Value::Signed(raw as i64)
        } else {
            Value::Unsigned(raw as u64)
        };
    }

    let d = divisor as i128;
    if raw.abs() <= F64_EXACT {
        Value::Float(raw as f64 / d as f64)
    } else {
        // split first so a 64-bit counter isn't rounded before it is scaled
        Value::Float((raw / d) as f64 + (raw % d) as f64 / d as f64)
    }
}

pub fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

fn to_value(field: &FieldSpec, raw: Raw) -> Value {
    let bits = match raw {
        Raw::Unsigned(v) => Some(v),
        Raw::Signed(_, bits) => Some(bits),
        _ => None,
    };

    if let (Some(sentinel), Some(bits)) = (field.sentinel, bits) {
        if sentinel.raw == bits {
            return Value::Signed(sentinel.fallback);
        }
    }

    match raw {
        Raw::Unsigned(v) => scale(v as i128, field.divisor),
        Raw::Signed(v, _) => match scale(v as i128, field.divisor) {
            // keep signed fields signed even when positive
            Value::Unsigned(u) => Value::Signed(u as i64),
            other => other,
        },
        Raw::Float(v) => Value::Float(v as f64),
        Raw::Text(bytes) => Value::Text(ascii(bytes)),
    }
}

fn decode_fields<'a>(
    block: &'static str,
    fields: impl Iterator<Item = &'a FieldSpec>,
    mut input: &[u8],
) -> Result<DecodedState, DecodeError> {
    let mut state = DecodedState::new();

    for field in fields {
        let (rest, raw) = parse_raw(input, field).map_err(|_| DecodeError::Truncated {
            block,
            field: field.name,
        })?;
        state.insert(field.name, to_value(field, raw));
        input = rest;
    }

    Ok(state)
}

/// Decode one register block. `raw` must be exactly the block's byte length.
pub fn decode(layout: &RegisterBlockLayout, raw: &[u8]) -> Result<DecodedState, DecodeError> {
    if raw.len() != layout.byte_len() {
        return Err(DecodeError::Length {
            block: layout.name,
            expected: layout.byte_len(),
            actual: raw.len(),
        });
    }

    decode_fields(layout.name, layout.fields.iter(), raw)
}

/// Decode a single command register read back from the device.
pub fn decode_register(command: &CommandSpec, raw: &[u8]) -> Result<Value, DecodeError> {
    let mut state = decode_fields(command.name, std::iter::once(&command.field), raw)?;
    state
        .0
        .remove(command.name)
        .ok_or(DecodeError::Truncated {
            block: command.name,
            field: command.name,
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub register: u16,
    pub values: Vec<u16>,
}

pub fn encode(command: &CommandSpec, value: f64) -> Result<WriteRequest, CommandError> {
    let out_of_range = || CommandError::ValueOutOfRange {
        name: command.name.to_string(),
        value,
    };

    if let CommandTarget::Register {
        writable: false, ..
    } = command.target
    {
        return Err(CommandError::NotWritable(command.name.to_string()));
    }

    if !value.is_finite() {
        return Err(out_of_range());
    }

    if let Some((min, max)) = command.range {
        if value < min || value > max {
            return Err(out_of_range());
        }
    }

    match command.target {
        CommandTarget::Register { address, .. } => {
            let scaled = value * command.field.divisor as f64;
            // finer than the register's resolution
            if (scaled - scaled.round()).abs() > 1e-6 {
                return Err(CommandError::InvalidPayload(value.to_string()));
            }
            let raw = scaled.round();
            let word = if command.field.kind.signed() {
                if raw < i16::MIN as f64 || raw > i16::MAX as f64 {
                    return Err(out_of_range());
                }
                raw as i16 as u16
            } else {
                if raw < 0.0 || raw > u16::MAX as f64 {
                    return Err(out_of_range());
                }
                raw as u16
            };

            Ok(WriteRequest {
                register: address,
                values: vec![word],
            })
        }
        CommandTarget::Trigger {
            when_zero,
            otherwise,
        } => Ok(WriteRequest {
            register: if value == 0.0 { when_zero } else { otherwise },
            values: vec![0],
        }),
    }
}

/// Register to read for a query-style (empty payload) command.
pub fn query_register(command: &CommandSpec) -> Result<u16, CommandError> {
    match command.target {
        CommandTarget::Register { address, .. } => Ok(address),
        CommandTarget::Trigger { .. } => Err(CommandError::NotQueryable(command.name.to_string())),
    }
}
