use crate::prelude::*;
use crate::goodwe::codec::DecodedState;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, Publish, QoS};

const PUBLISH_ATTEMPTS: usize = 3;

// Message {{{
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

impl Message {
    /// Telemetry for one unit: the whole decoded cycle as one retained JSON object.
    pub fn for_state(serial: &Serial, state: &DecodedState) -> Result<Message> {
        Ok(Message {
            topic: serial.to_string(),
            retain: true,
            payload: state.to_json()?,
        })
    }

    pub fn for_result(topic: String, payload: String) -> Message {
        Message {
            topic,
            retain: false,
            payload,
        }
    }

    /// Availability payloads are JSON; anything but 0, false or "0" means the grid is up.
    pub fn payload_available(&self) -> bool {
        match serde_json::from_str::<serde_json::Value>(self.payload.trim()) {
            Ok(serde_json::Value::Bool(b)) => b,
            Ok(serde_json::Value::Number(n)) => n.as_f64() != Some(0.0),
            Ok(serde_json::Value::String(s)) => s != "0",
            Ok(_) => true,
            Err(_) => self.payload.trim() != "0",
        }
    }
} // }}}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChannelData {
    /// topic relative to the namespace
    Message(Message),
    /// one of the configured grid availability topics, absolute
    Availability(Message),
    Shutdown,
}

#[derive(Clone)]
pub struct Mqtt {
    config: ConfigWrapper,
    channels: Channels,
}

impl Mqtt {
    pub fn new(config: ConfigWrapper, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self) -> Result<()> {
        let c = self.config.mqtt();

        if !c.enabled() {
            info!("mqtt disabled, skipping");
            return Ok(());
        }

        let mut options = MqttOptions::new(c.client_id(), c.host(), c.port());

        let will = LastWill {
            topic: self.lwt_topic(),
            message: bytes::Bytes::from("offline"),
            qos: QoS::AtLeastOnce,
            retain: true,
        };
        options.set_last_will(will);

        options.set_keep_alive(std::time::Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.username(), c.password()) {
            options.set_credentials(u, p);
        }

        info!("initializing mqtt at {}:{}", c.host(), c.port());

        let (client, eventloop) = AsyncClient::new(options, 10);

        futures::try_join!(
            self.setup(client.clone()),
            self.receiver(eventloop),
            self.sender(client)
        )?;

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping MQTT client...");
        let _ = self.channels.to_mqtt.send(ChannelData::Shutdown);
        Ok(())
    }

    async fn setup(&self, client: AsyncClient) -> Result<()> {
        let namespace = self.config.mqtt().namespace().to_owned();

        client
            .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "online")
            .await?;

        // <ns>/<serial>/<command>, <ns>/<serial>/<command>/set, <ns>/<serial>/set/<command>
        for filter in ["+/+", "+/+/set", "+/set/+"] {
            client
                .subscribe(format!("{}/{}", namespace, filter), QoS::AtMostOnce)
                .await?;
        }

        for topic in self.config.availability_topics() {
            info!("watching grid availability on {}", topic);
            client.subscribe(topic, QoS::AtMostOnce).await?;
        }

        Ok(())
    }

    // mqtt -> coordinator
    async fn receiver(&self, mut eventloop: EventLoop) -> Result<()> {
        let mut shutdown = self.channels.to_mqtt.subscribe();

        loop {
            tokio::select! {
                msg = shutdown.recv() => {
                    if let Ok(ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed) = msg {
                        break;
                    }
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        if let Err(e) = self.handle_message(publish) {
                            warn!("{}", e);
                        }
                    }
                    Err(e) => {
                        error!("{}", e);
                        info!("reconnecting in 5s");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                    _ => {} // keepalives etc
                },
            }
        }

        info!("MQTT receiver loop exiting");
        Ok(())
    }

    /// Route one inbound publish to the coordinator. Payloads that aren't valid UTF-8 are
    /// still forwarded (lossily) so the command gets its failure result.
    pub fn handle_message(&self, publish: Publish) -> Result<()> {
        let payload = String::from_utf8_lossy(&publish.payload).into_owned();

        let data = if self.config.availability_topics().contains(&publish.topic) {
            ChannelData::Availability(Message {
                topic: publish.topic,
                retain: publish.retain,
                payload,
            })
        } else {
            let namespace = self.config.mqtt().namespace().to_owned();
            // remove the namespace, including the first /
            let topic = match publish.topic.strip_prefix(&namespace) {
                Some(rest) if rest.starts_with('/') => rest[1..].to_owned(),
                _ => bail!("ignoring message outside {}: {}", namespace, publish.topic),
            };
            ChannelData::Message(Message {
                topic,
                retain: publish.retain,
                payload,
            })
        };

        debug!("RX: {:?}", data);
        if self.channels.from_mqtt.send(data).is_err() {
            bail!("send(from_mqtt) failed - channel closed?");
        }

        Ok(())
    }

    // coordinator/pollers -> mqtt
    async fn sender(&self, client: AsyncClient) -> Result<()> {
        let mut receiver = self.channels.to_mqtt.subscribe();

        loop {
            match receiver.recv().await {
                Ok(ChannelData::Shutdown) | Err(broadcast::error::RecvError::Closed) => {
                    info!("MQTT sender received shutdown signal");
                    let _ = client.disconnect().await;
                    break;
                }
                Ok(ChannelData::Message(message)) => self.publish(&client, message).await,
                Ok(ChannelData::Availability(_)) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("MQTT sender lagged, {} messages dropped", n);
                }
            }
        }

        info!("MQTT sender loop exiting");
        Ok(())
    }

    async fn publish(&self, client: &AsyncClient, message: Message) {
        let topic = format!("{}/{}", self.config.mqtt().namespace(), message.topic);
        debug!("publishing: {} = {}", topic, message.payload);

        for attempt in 1..=PUBLISH_ATTEMPTS {
            match client
                .publish(&topic, QoS::AtLeastOnce, message.retain, message.payload.as_bytes())
                .await
            {
                Ok(_) => return,
                Err(err) => {
                    error!(
                        "MQTT publish failed: {:?} (attempt {}/{})",
                        err, attempt, PUBLISH_ATTEMPTS
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                }
            }
        }

        error!("giving up on {}", topic);
    }

    fn lwt_topic(&self) -> String {
        format!("{}/LWT", self.config.mqtt().namespace())
    }
}
