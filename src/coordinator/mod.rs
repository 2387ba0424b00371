use crate::prelude::*;

pub mod commands;

use crate::command::{Action, Command};
use crate::error::CommandError;

/// Turns inbound MQTT commands into register reads/writes and reports one result per
/// command.
#[derive(Clone)]
pub struct Coordinator {
    channels: Channels,
    arbiter: Arbiter,
    cache: IdentityCache,
    units: Vec<LogicalUnit>,
}

impl Coordinator {
    pub fn new(
        channels: Channels,
        arbiter: Arbiter,
        cache: IdentityCache,
        units: Vec<LogicalUnit>,
    ) -> Self {
        Self {
            channels,
            arbiter,
            cache,
            units,
        }
    }

    /// Returns Err only when a command hit a fatal transport error.
    pub async fn start(&self) -> Result<()> {
        self.mqtt_receiver().await
    }

    pub fn stop(&self) {
        let _ = self.channels.from_mqtt.send(mqtt::ChannelData::Shutdown);
    }

    async fn mqtt_receiver(&self) -> Result<()> {
        use mqtt::ChannelData::*;

        let mut receiver = self.channels.from_mqtt.subscribe();

        loop {
            match receiver.recv().await {
                Ok(Message(message)) => self.process_message(message).await?,
                Ok(Availability(message)) => self.process_availability(message).await?,
                Ok(Shutdown) | Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("coordinator lagged, {} inbound messages dropped", n);
                }
            }
        }

        info!("coordinator exiting");
        Ok(())
    }

    pub async fn process_message(&self, message: mqtt::Message) -> Result<()> {
        match Command::from_message(&message) {
            Some(command) => {
                info!("parsed command {:?}", command);
                self.process_command(command).await
            }
            None => {
                debug!("ignoring {}", message.topic);
                Ok(())
            }
        }
    }

    pub async fn process_availability(&self, message: mqtt::Message) -> Result<()> {
        let available = message.payload_available();
        info!(
            "grid {} ({} = {})",
            if available { "available" } else { "lost" },
            message.topic,
            message.payload
        );

        let commands =
            commands::grid_availability::GridAvailability::new(&self.cache, &self.units, available)
                .commands();
        for command in commands {
            self.process_command(command).await?;
        }

        Ok(())
    }

    pub async fn process_command(&self, command: Command) -> Result<()> {
        let result = self.execute(&command).await;

        let payload = match &result {
            Ok(value) => value.clone(),
            Err(err) => format!("failed: {}", err),
        };

        let reply = mqtt::ChannelData::Message(mqtt::Message::for_result(
            command.to_result_topic(),
            payload,
        ));
        if self.channels.to_mqtt.send(reply).is_err() {
            bail!("send(to_mqtt) failed - channel closed?");
        }

        if let Err(err) = result {
            if let Some(fatal) = err.fatal_transport() {
                bail!("{} on {}: {}", command.name, command.serial, fatal);
            }
            warn!("{} on {}: {}", command.name, command.serial, err);
        }

        Ok(())
    }

    async fn execute(&self, command: &Command) -> Result<String, CommandError> {
        let unknown_serial = || CommandError::UnknownSerial(command.serial.clone());

        let identity = self
            .cache
            .find_by_serial(&command.serial)
            .ok_or_else(unknown_serial)?;
        let unit = self
            .units
            .iter()
            .find(|u| u.address == identity.address)
            .ok_or_else(unknown_serial)?;
        let spec = unit.profile.command(&command.name)?;

        match command.action()? {
            Action::Query => {
                commands::query_register::QueryRegister::new(
                    self.arbiter.clone(),
                    unit.address,
                    spec,
                )
                .run()
                .await
                .map(|value| value.to_string())
            }
            Action::Write(value) => {
                commands::write_register::WriteRegister::new(
                    self.arbiter.clone(),
                    unit.address,
                    spec,
                    value,
                )
                .run()
                .await
                .map(|value| value.to_string())
            }
        }
    }
}
