use crate::prelude::*;
use crate::error::CommandError;
use crate::goodwe::codec;
use crate::goodwe::profile::CommandSpec;

pub struct WriteRegister {
    arbiter: Arbiter,
    unit: u8,
    command: CommandSpec,
    value: f64,
}

impl WriteRegister {
    pub fn new(arbiter: Arbiter, unit: u8, command: &CommandSpec, value: f64) -> Self {
        Self {
            arbiter,
            unit,
            command: *command,
            value,
        }
    }

    /// Returns the value the device accepted.
    pub async fn run(&self) -> Result<f64, CommandError> {
        let request = codec::encode(&self.command, self.value)?;

        info!(
            "[write_register] unit {}: {} = {} -> register {} {:?}",
            self.unit, self.command.name, self.value, request.register, request.values
        );

        self.arbiter
            .write(self.unit, request.register, request.values)
            .await?;

        Ok(self.value)
    }
}
