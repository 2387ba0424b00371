use crate::prelude::*;
use crate::error::ConfigError;
use crate::goodwe::identity::LogicalUnit;
use crate::goodwe::profile;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

// highest unit id Modbus allows on a shared bus
const MAX_UNIT_ADDRESS: u8 = 247;

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub transport: Transport,
    pub units: Vec<Unit>,
    pub mqtt: Mqtt,

    #[serde(default = "Config::default_availability_topics")]
    pub availability_topics: Vec<String>,

    /// pause between the end of one poll cycle and the start of the next
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "Config::default_wait")]
    pub wait: Duration,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Transport {{{
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// RTU frames, over a serial line or tunnelled through a TCP socket
    #[default]
    Rtu,
    /// Modbus-TCP (MBAP header)
    Tcp,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Transport {
    pub serial: Option<String>,
    pub host: Option<String>,

    #[serde(default = "Config::default_modbus_port")]
    pub port: u16,
    #[serde(default)]
    pub framing: Framing,
    #[serde(default = "Config::default_baud_rate")]
    pub baud_rate: u32,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "Config::default_timeout", rename = "timeout_ms")]
    pub timeout: Duration,
}
impl Transport {
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
} // }}}

// Unit {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Unit {
    pub address: u8,
    #[serde(rename = "type")]
    pub device_type: String,
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_namespace")]
    pub namespace: String,

    #[serde(default = "Config::default_mqtt_client_id")]
    pub client_id: String,
}
impl Mqtt {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
} // }}}

#[derive(Clone, Debug)]
pub struct ConfigWrapper {
    config: Arc<Config>,
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        Ok(Self::from_config(Config::new(file)?))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn transport(&self) -> Transport {
        self.config.transport.clone()
    }

    pub fn logical_units(&self) -> Result<Vec<LogicalUnit>, ConfigError> {
        self.config.logical_units()
    }

    pub fn mqtt(&self) -> Mqtt {
        self.config.mqtt.clone()
    }

    pub fn availability_topics(&self) -> Vec<String> {
        self.config.availability_topics.clone()
    }

    pub fn wait(&self) -> Duration {
        self.config.wait
    }

    pub fn loglevel(&self) -> String {
        self.config.loglevel.clone()
    }

    pub fn log_summary(&self) {
        self.config.log_summary()
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        Self::from_yaml(&content)
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        match (&self.transport.serial, &self.transport.host) {
            (Some(path), _) => info!(
                "  Transport: serial {} @ {} baud",
                path, self.transport.baud_rate
            ),
            (None, Some(host)) => info!(
                "  Transport: {}:{} ({:?} framing)",
                host, self.transport.port, self.transport.framing
            ),
            (None, None) => {}
        }
        info!("    Timeout: {}ms", self.transport.timeout.as_millis());
        for (i, unit) in self.units.iter().enumerate() {
            info!("  Unit[{}]: address {} type {}", i, unit.address, unit.device_type);
        }
        info!("  MQTT: {}", if self.mqtt.enabled { "enabled" } else { "disabled" });
        if self.mqtt.enabled {
            info!("    Host: {}", self.mqtt.host);
            info!("    Port: {}", self.mqtt.port);
            info!("    Namespace: {}", self.mqtt.namespace);
        }
        info!("  Availability topics: {:?}", self.availability_topics);
        info!("  Wait: {}ms", self.wait.as_millis());
        info!("  Log Level: {}", self.loglevel);
    }

    /// Parse and validate, without touching the filesystem.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.transport.serial.is_some() == self.transport.host.is_some() {
            return Err(ConfigError::MissingTransport.into());
        }
        if self.transport.host.is_some() && self.transport.port == 0 {
            bail!("transport.port must be between 1 and 65535");
        }
        if self.transport.timeout.is_zero() {
            bail!("transport.timeout_ms must be greater than 0");
        }

        if self.mqtt.enabled {
            if self.mqtt.port == 0 {
                bail!("mqtt.port must be between 1 and 65535");
            }
            if self.mqtt.host.is_empty() {
                bail!("mqtt.host cannot be empty");
            }
        }

        self.logical_units()?;

        Ok(())
    }

    pub fn logical_units(&self) -> Result<Vec<LogicalUnit>, ConfigError> {
        if self.units.is_empty() {
            return Err(ConfigError::NoUnits);
        }

        let mut seen = HashSet::new();
        self.units
            .iter()
            .map(|unit| {
                if unit.address == 0 || unit.address > MAX_UNIT_ADDRESS {
                    return Err(ConfigError::InvalidUnitAddress(unit.address));
                }
                if !seen.insert(unit.address) {
                    return Err(ConfigError::DuplicateUnitAddress(unit.address));
                }
                Ok(LogicalUnit::new(
                    unit.address,
                    profile::lookup(&unit.device_type)?,
                ))
            })
            .collect()
    }

    fn default_modbus_port() -> u16 {
        502
    }

    fn default_baud_rate() -> u32 {
        9600
    }

    fn default_timeout() -> Duration {
        Duration::from_millis(1000)
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_namespace() -> String {
        "GoodWe".to_string()
    }

    fn default_mqtt_client_id() -> String {
        "gwClient".to_string()
    }

    fn default_availability_topics() -> Vec<String> {
        vec!["NA/0/state".to_string()]
    }

    fn default_wait() -> Duration {
        Duration::from_millis(10000)
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}
