#![allow(dead_code)]

pub use goodwe_bridge::prelude::*;
pub use goodwe_bridge::{goodwe, modbus};

use async_trait::async_trait;
use goodwe_bridge::error::TransportError;
use goodwe_bridge::modbus::transport::Transport;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn common_setup() {
    goodwe_bridge::init_logging("debug");
}

pub struct Factory();
impl Factory {
    pub fn et_unit(address: u8) -> LogicalUnit {
        LogicalUnit::new(address, &goodwe::et::PROFILE)
    }

    pub fn dt_unit(address: u8) -> LogicalUnit {
        LogicalUnit::new(address, &goodwe::dt::PROFILE)
    }

    /// ASCII packed two bytes per register, NUL padded to `count` registers.
    pub fn ascii_registers(text: &str, count: usize) -> Vec<u16> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(count * 2, 0);
        bytes
            .chunks(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }

    pub fn arbiter(mock: &MockTransport) -> Arbiter {
        Arbiter::new(Box::new(mock.clone()))
    }

    pub fn poller(
        unit: LogicalUnit,
        mock: &MockTransport,
        cache: &IdentityCache,
        channels: &Channels,
    ) -> goodwe::inverter::Poller {
        goodwe::inverter::Poller::new(
            unit,
            Factory::arbiter(mock),
            cache.clone(),
            channels.clone(),
            Duration::from_secs(10),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    Read { unit: u8, address: u16, count: u16 },
    Write { unit: u8, address: u16, values: Vec<u16> },
}

#[derive(Default)]
struct MockState {
    unit: u8,
    registers: HashMap<(u8, u16), u16>,
    failures: HashMap<(u8, u16), TransportError>,
    ops: Vec<MockOp>,
}

/// In-memory register map standing in for the field bus. Every operation takes a little
/// (virtual) time so overlapping callers would be noticed.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_registers(&self, unit: u8, start: u16, values: &[u16]) {
        let mut state = self.state.lock().unwrap();
        for (i, value) in values.iter().enumerate() {
            state.registers.insert((unit, start + i as u16), *value);
        }
    }

    pub fn register(&self, unit: u8, address: u16) -> u16 {
        let state = self.state.lock().unwrap();
        state.registers.get(&(unit, address)).copied().unwrap_or(0)
    }

    /// Any operation starting at `address` on `unit` fails with `err`.
    pub fn fail_at(&self, unit: u8, address: u16, err: TransportError) {
        self.state.lock().unwrap().failures.insert((unit, address), err);
    }

    pub fn ops(&self) -> Vec<MockOp> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn reads(&self) -> Vec<u16> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                MockOp::Read { address, .. } => Some(address),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<(u16, Vec<u16>)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                MockOp::Write {
                    address, values, ..
                } => Some((address, values)),
                _ => None,
            })
            .collect()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    fn leave(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn set_unit(&mut self, unit: u8) {
        self.state.lock().unwrap().unit = unit;
    }

    async fn read_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        self.enter().await;

        let result = {
            let mut state = self.state.lock().unwrap();
            let unit = state.unit;
            state.ops.push(MockOp::Read {
                unit,
                address,
                count,
            });

            match state.failures.get(&(unit, address)) {
                Some(err) => Err(err.clone()),
                None => Ok((0..count)
                    .map(|i| {
                        state
                            .registers
                            .get(&(unit, address + i))
                            .copied()
                            .unwrap_or(0)
                    })
                    .collect()),
            }
        };

        self.leave();
        result
    }

    async fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<(), TransportError> {
        self.enter().await;

        let result = {
            let mut state = self.state.lock().unwrap();
            let unit = state.unit;
            state.ops.push(MockOp::Write {
                unit,
                address,
                values: values.to_vec(),
            });

            match state.failures.get(&(unit, address)) {
                Some(err) => Err(err.clone()),
                None => {
                    for (i, value) in values.iter().enumerate() {
                        state.registers.insert((unit, address + i as u16), *value);
                    }
                    Ok(())
                }
            }
        };

        self.leave();
        result
    }
}

pub fn mqtt_message(topic: &str, payload: &str) -> mqtt::Message {
    mqtt::Message {
        topic: topic.to_string(),
        retain: false,
        payload: payload.to_string(),
    }
}

/// Next message queued for publishing, or panic.
pub fn next_published(rx: &mut broadcast::Receiver<mqtt::ChannelData>) -> mqtt::Message {
    match rx.try_recv() {
        Ok(mqtt::ChannelData::Message(message)) => message,
        other => panic!("expected a message, got {:?}", other),
    }
}
