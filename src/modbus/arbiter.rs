//! Single serialization point for the shared field bus.
//!
//! Every poller and the command bridge go through [`Arbiter::execute`]. The lock is held
//! for exactly one request/response exchange (select unit, transfer, release), so a write
//! command can slip in between two block reads of a poll cycle but never in the middle of
//! one.

use crate::error::TransportError;
use crate::modbus::transport::Transport;

use {
    bytes::{BufMut, Bytes, BytesMut},
    std::sync::Arc,
    tokio::sync::Mutex,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Read { address: u16, count: u16 },
    Write { address: u16, values: Vec<u16> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// register words, big-endian
    Read(Bytes),
    Written,
}

impl Response {
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Self::Read(bytes) => Some(bytes),
            Self::Written => None,
        }
    }
}

#[derive(Clone)]
pub struct Arbiter {
    link: Arc<Mutex<Box<dyn Transport>>>,
}

impl Arbiter {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            link: Arc::new(Mutex::new(transport)),
        }
    }

    pub async fn execute(&self, unit: u8, op: Operation) -> Result<Response, TransportError> {
        let mut link = self.link.lock().await;
        link.set_unit(unit);

        match op {
            Operation::Read { address, count } => {
                let words = link.read_registers(address, count).await?;
                Ok(Response::Read(to_bytes(&words)))
            }
            Operation::Write { address, values } => {
                link.write_registers(address, &values).await?;
                Ok(Response::Written)
            }
        }
    }

    pub async fn read(&self, unit: u8, address: u16, count: u16) -> Result<Bytes, TransportError> {
        match self.execute(unit, Operation::Read { address, count }).await? {
            Response::Read(bytes) => Ok(bytes),
            Response::Written => Err(TransportError::protocol("write response to a read")),
        }
    }

    pub async fn write(&self, unit: u8, address: u16, values: Vec<u16>) -> Result<(), TransportError> {
        self.execute(unit, Operation::Write { address, values })
            .await
            .map(|_| ())
    }
}

fn to_bytes(words: &[u16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(words.len() * 2);
    for word in words {
        buf.put_u16(*word);
    }
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_big_endian() {
        assert_eq!(to_bytes(&[0x0102, 0xA0B0]).as_ref(), &[0x01, 0x02, 0xA0, 0xB0]);
    }
}
