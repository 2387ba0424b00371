use crate::goodwe::codec;
use crate::goodwe::profile::DeviceProfile;

use {
    serde::{Serialize, Serializer},
    std::collections::HashMap,
    std::sync::{Arc, RwLock},
};

// Serial {{{
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Serial(String);

impl Serial {
    /// From the raw identity registers: ASCII, NUL padded.
    pub fn from_registers(bytes: &[u8]) -> Self {
        Self(codec::ascii(bytes).trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Serial {
    fn from(s: &str) -> Self {
        Self(s.trim().to_string())
    }
}

impl std::fmt::Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Serial {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
} // }}}

/// One device on the shared link.
#[derive(Debug, Clone, Copy)]
pub struct LogicalUnit {
    pub address: u8,
    pub profile: &'static DeviceProfile,
}

impl LogicalUnit {
    pub fn new(address: u8, profile: &'static DeviceProfile) -> Self {
        Self { address, profile }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitIdentity {
    pub address: u8,
    pub serial: Serial,
}

/// Unit address -> serial, filled in lazily by each unit's poller and never cleared.
#[derive(Clone, Default)]
pub struct IdentityCache {
    inner: Arc<RwLock<HashMap<u8, Serial>>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: u8) -> Option<Serial> {
        self.inner
            .read()
            .ok()
            .and_then(|map| map.get(&address).cloned())
    }

    pub fn set(&self, address: u8, serial: Serial) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(address).or_insert(serial);
        }
    }

    pub fn find_by_serial(&self, serial: &str) -> Option<UnitIdentity> {
        let map = self.inner.read().ok()?;
        map.iter()
            .find(|(_, s)| s.as_str() == serial)
            .map(|(address, s)| UnitIdentity {
                address: *address,
                serial: s.clone(),
            })
    }
}
