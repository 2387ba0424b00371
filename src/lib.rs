pub mod channels;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod goodwe;
pub mod modbus;
pub mod mqtt;
pub mod options;
pub mod prelude;

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::coordinator::Coordinator;
use crate::goodwe::inverter::Poller;
use crate::modbus::transport::ModbusLink;
use crate::mqtt::Mqtt;

use std::io::Write;

/// Everything that has to be told to stop on shutdown.
#[derive(Clone)]
pub struct Components {
    pub coordinator: Coordinator,
    pub mqtt: Mqtt,
    pub channels: Channels,
}

impl Components {
    /// Coordinator first so no new commands start, then MQTT.
    pub async fn stop(&self) {
        info!("Stopping all components...");

        self.coordinator.stop();
        let _ = self.mqtt.stop().await;

        info!("Shutdown complete");
    }
}

/// `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();
}

/// Runs until `shutdown_rx` fires or a component fails. A fatal transport error in a poller
/// or in a command ends the app with that error.
pub async fn app(
    mut shutdown_rx: broadcast::Receiver<()>,
    config: ConfigWrapper,
) -> Result<()> {
    info!("goodwe-bridge {} starting", CARGO_PKG_VERSION);

    let units = config.logical_units()?;

    info!("Initializing channels...");
    let channels = Channels::new();
    let cache = IdentityCache::new();

    info!("Connecting to the field bus...");
    let link = ModbusLink::connect(&config.transport()).await?;
    let arbiter = Arbiter::new(Box::new(link));

    info!("Initializing components...");
    let mut tasks = tokio::task::JoinSet::new();

    info!("  Creating MQTT client...");
    let mqtt = Mqtt::new(config.clone(), channels.clone());
    let mqtt_clone = mqtt.clone();
    tasks.spawn(async move { mqtt_clone.start().await });

    info!("  Creating Coordinator...");
    let coordinator = Coordinator::new(
        channels.clone(),
        arbiter.clone(),
        cache.clone(),
        units.clone(),
    );
    let coordinator_clone = coordinator.clone();
    tasks.spawn(async move { coordinator_clone.start().await });

    info!("  Creating {} pollers...", units.len());
    for unit in units {
        let poller = Poller::new(
            unit,
            arbiter.clone(),
            cache.clone(),
            channels.clone(),
            config.wait(),
        );
        tasks.spawn(async move { poller.run().await });
    }

    let components = Components {
        coordinator,
        mqtt,
        channels,
    };

    let result = loop {
        tokio::select! {
            joined = tasks.join_next() => match joined {
                None => break Ok(()),
                // mqtt returns straight away when disabled
                Some(Ok(Ok(()))) => continue,
                Some(Ok(Err(e))) => {
                    error!("{}", e);
                    break Err(e);
                }
                Some(Err(e)) => break Err(anyhow!("task failed: {}", e)),
            },
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping components...");
                break Ok(());
            }
        }
    };

    components.stop().await;
    tasks.abort_all();

    info!("Application shutdown complete");
    result
}
