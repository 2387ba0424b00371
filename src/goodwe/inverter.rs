use crate::prelude::*;
use crate::error::{DecodeError, TransportError};
use crate::goodwe::codec::{self, DecodedState};
use crate::goodwe::profile::BlockRead;

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published,
    Skipped,
}

#[derive(Debug, thiserror::Error)]
enum CycleError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Polls one logical unit: resolve its serial once, then read, decode and publish its
/// register blocks every `wait`.
#[derive(Clone)]
pub struct Poller {
    unit: LogicalUnit,
    arbiter: Arbiter,
    cache: IdentityCache,
    channels: Channels,
    wait: Duration,
}

impl Poller {
    pub fn new(
        unit: LogicalUnit,
        arbiter: Arbiter,
        cache: IdentityCache,
        channels: Channels,
        wait: Duration,
    ) -> Self {
        Self {
            unit,
            arbiter,
            cache,
            channels,
            wait,
        }
    }

    /// Only returns on a fatal transport error.
    pub async fn run(&self) -> Result<()> {
        info!(
            "unit {}: polling {} every {}ms",
            self.unit.address,
            self.unit.profile.device_type,
            self.wait.as_millis()
        );

        loop {
            self.cycle()
                .await
                .map_err(|e| anyhow!("unit {}: {}", self.unit.address, e))?;
            tokio::time::sleep(self.wait).await;
        }
    }

    pub async fn cycle(&self) -> Result<CycleOutcome, TransportError> {
        let serial = match self.cache.get(self.unit.address) {
            Some(serial) => serial,
            None => match self.identify().await? {
                Some(serial) => serial,
                None => return Ok(CycleOutcome::Skipped),
            },
        };

        let state = match self.read_state().await {
            Ok(state) => state,
            Err(CycleError::Transport(e)) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("unit {} ({}): cycle discarded: {}", self.unit.address, serial, e);
                return Ok(CycleOutcome::Skipped);
            }
        };

        let message = match mqtt::Message::for_state(&serial, &state) {
            Ok(message) => message,
            Err(e) => {
                warn!("unit {} ({}): can't serialize state: {}", self.unit.address, serial, e);
                return Ok(CycleOutcome::Skipped);
            }
        };

        debug!(
            "unit {} ({}): publishing {} fields",
            self.unit.address,
            serial,
            state.len()
        );
        if self
            .channels
            .to_mqtt
            .send(mqtt::ChannelData::Message(message))
            .is_err()
        {
            warn!("send(to_mqtt) failed - channel closed?");
        }

        Ok(CycleOutcome::Published)
    }

    async fn identify(&self) -> Result<Option<Serial>, TransportError> {
        let identity = self.unit.profile.identity;

        let raw = match self
            .arbiter
            .read(self.unit.address, identity.start, identity.count)
            .await
        {
            Ok(raw) => raw,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("unit {}: identity read failed: {}", self.unit.address, e);
                return Ok(None);
            }
        };

        let serial = Serial::from_registers(&raw);
        if serial.is_empty() {
            warn!("unit {}: device reported an empty serial", self.unit.address);
            return Ok(None);
        }

        info!(
            "unit {}: {} inverter with serial {}",
            self.unit.address, self.unit.profile.device_type, serial
        );
        self.cache.set(self.unit.address, serial.clone());

        Ok(Some(serial))
    }

    /// Read every applicable block in profile order and build the published state.
    async fn read_state(&self) -> Result<DecodedState, CycleError> {
        let profile = self.unit.profile;

        // everything decoded this cycle, published or not; conditions look here
        let mut seen = DecodedState::new();
        let mut state = DecodedState::new();
        let mut first = true;

        for block in profile.blocks {
            if !self.should_read(block, &seen) {
                continue;
            }

            if !first {
                tokio::time::sleep(profile.block_pause()).await;
            }
            first = false;

            let layout = &block.layout;
            trace!(
                "unit {}: reading {} ({}+{})",
                self.unit.address,
                layout.name,
                layout.start,
                layout.count
            );
            let raw = self
                .arbiter
                .read(self.unit.address, layout.start, layout.count)
                .await?;
            let decoded = codec::decode(layout, &raw)?;

            seen.merge(decoded.clone());
            if block.publish {
                state.merge(decoded);
            }
        }

        profile.derive(&mut state);
        profile.check_limits(&state)?;

        Ok(state)
    }

    fn should_read(&self, block: &BlockRead, seen: &DecodedState) -> bool {
        match &block.condition {
            Some(condition) if !condition.holds(seen) => {
                trace!(
                    "unit {}: skipping {}, {} below {}",
                    self.unit.address,
                    block.layout.name,
                    condition.field,
                    condition.min
                );
                false
            }
            _ => true,
        }
    }
}
