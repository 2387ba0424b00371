use crate::prelude::*;
use crate::error::{CommandError, TransportError};
use crate::goodwe::codec::{self, Value};
use crate::goodwe::profile::CommandSpec;

/// Read a command's register back from the device.
pub struct QueryRegister {
    arbiter: Arbiter,
    unit: u8,
    command: CommandSpec,
}

impl QueryRegister {
    pub fn new(arbiter: Arbiter, unit: u8, command: &CommandSpec) -> Self {
        Self {
            arbiter,
            unit,
            command: *command,
        }
    }

    pub async fn run(&self) -> Result<Value, CommandError> {
        let register = codec::query_register(&self.command)?;

        info!(
            "[query_register] unit {}: reading {} from register {}",
            self.unit, self.command.name, register
        );

        let raw = self.arbiter.read(self.unit, register, 1).await?;

        codec::decode_register(&self.command, &raw)
            .map_err(|e| CommandError::Transport(TransportError::protocol(e.to_string())))
    }
}
