use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Channels {
    /// inbound commands and availability changes, namespace already stripped
    pub from_mqtt: broadcast::Sender<mqtt::ChannelData>,
    /// telemetry and command results waiting to be published
    pub to_mqtt: broadcast::Sender<mqtt::ChannelData>,
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self {
            from_mqtt: Self::channel(),
            to_mqtt: Self::channel(),
        }
    }

    fn channel<T: Clone>() -> broadcast::Sender<T> {
        broadcast::channel(2048).0
    }
}
