//! Register block layouts.
//!
//! A layout is a contiguous run of holding registers plus the ordered list of fields packed
//! into it, big-endian, exactly as the inverter lays them out. Layouts are `const` data so
//! adding a firmware revision means adding a table.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U16,
    I16,
    U32,
    I32,
    U64,
    F32,
    /// ASCII, fixed byte length.
    Text(usize),
}

impl FieldKind {
    pub const fn width(&self) -> usize {
        match self {
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 => 8,
            Self::Text(len) => *len,
        }
    }

    pub const fn signed(&self) -> bool {
        matches!(self, Self::I16 | Self::I32)
    }
}

/// Raw bit pattern the inverter uses for "channel absent", and what to report instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinel {
    pub raw: u64,
    pub fallback: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    /// physical = raw / divisor
    pub divisor: u32,
    pub sentinel: Option<Sentinel>,
    /// bytes to step over before this field
    pub skip_before: usize,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            divisor: 1,
            sentinel: None,
            skip_before: 0,
        }
    }

    pub const fn u16(name: &'static str) -> Self {
        Self::new(name, FieldKind::U16)
    }

    pub const fn i16(name: &'static str) -> Self {
        Self::new(name, FieldKind::I16)
    }

    pub const fn u32(name: &'static str) -> Self {
        Self::new(name, FieldKind::U32)
    }

    pub const fn i32(name: &'static str) -> Self {
        Self::new(name, FieldKind::I32)
    }

    pub const fn u64(name: &'static str) -> Self {
        Self::new(name, FieldKind::U64)
    }

    pub const fn f32(name: &'static str) -> Self {
        Self::new(name, FieldKind::F32)
    }

    pub const fn text(name: &'static str, len: usize) -> Self {
        Self::new(name, FieldKind::Text(len))
    }

    pub const fn div(mut self, divisor: u32) -> Self {
        self.divisor = divisor;
        self
    }

    /// All-ones for the field width decodes to `fallback`.
    pub const fn absent_as(mut self, fallback: i64) -> Self {
        let raw = match self.kind.width() {
            2 => 0xFFFF,
            4 => 0xFFFF_FFFF,
            _ => u64::MAX,
        };
        self.sentinel = Some(Sentinel { raw, fallback });
        self
    }

    /// Skip `registers` 16-bit words before this field.
    pub const fn skip(mut self, registers: usize) -> Self {
        self.skip_before = registers * 2;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterBlockLayout {
    pub name: &'static str,
    pub start: u16,
    pub count: u16,
    pub fields: &'static [FieldSpec],
}

impl RegisterBlockLayout {
    pub const fn byte_len(&self) -> usize {
        self.count as usize * 2
    }

    /// Bytes actually covered by fields; the rest of the block is ignored.
    pub fn used_bytes(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.skip_before + f.kind.width())
            .sum()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }
}
