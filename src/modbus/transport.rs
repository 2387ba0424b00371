use crate::prelude::*;
use crate::config::{Framing, Transport as TransportConfig};
use crate::error::TransportError;

use {
    async_trait::async_trait,
    net2::TcpStreamExt,
    std::time::Duration,
    tokio_modbus::client::{rtu, tcp, Context},
    tokio_modbus::prelude::{Reader, Slave, SlaveContext, Writer},
};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;

/// One physical link to the field bus. Callers must not interleave operations; see
/// [`crate::modbus::arbiter::Arbiter`].
#[async_trait]
pub trait Transport: Send {
    fn set_unit(&mut self, unit: u8);

    async fn read_registers(&mut self, address: u16, count: u16)
        -> Result<Vec<u16>, TransportError>;

    async fn write_registers(&mut self, address: u16, values: &[u16])
        -> Result<(), TransportError>;
}

pub struct ModbusLink {
    ctx: Context,
    timeout: Duration,
    description: String,
}

impl ModbusLink {
    pub async fn connect(config: &TransportConfig) -> Result<Self> {
        let timeout = config.timeout();

        let (ctx, description) = match (config.serial(), config.host()) {
            (Some(path), None) => {
                info!("opening serial port {} at {} baud", path, config.baud_rate());
                let builder = tokio_serial::new(path, config.baud_rate());
                let port = tokio_serial::SerialStream::open(&builder)
                    .map_err(|err| anyhow!("can't open {}: {}", path, err))?;
                (rtu::attach_slave(port, Slave(0)), path.to_string())
            }
            (None, Some(host)) => {
                let stream = Self::tcp_connect(host, config.port()).await?;
                let description = format!("{}:{}", host, config.port());
                let ctx = match config.framing() {
                    Framing::Rtu => rtu::attach_slave(stream, Slave(0)),
                    Framing::Tcp => tcp::attach_slave(stream, Slave(0)),
                };
                (ctx, description)
            }
            _ => bail!("{}", crate::error::ConfigError::MissingTransport),
        };

        info!("modbus link up on {} ({:?} framing)", description, config.framing());

        Ok(Self {
            ctx,
            timeout,
            description,
        })
    }

    async fn tcp_connect(host: &str, port: u16) -> Result<tokio::net::TcpStream> {
        info!("connecting to {}:{}", host, port);

        let stream = match tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            tokio::net::TcpStream::connect((host, port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => bail!("failed to connect to {}:{}: {}", host, port, e),
            Err(_) => bail!("connection timeout after {} seconds", CONNECT_TIMEOUT_SECS),
        };

        // keepalive so a dead RS485 gateway shows up as a broken connection
        let std_stream = stream.into_std()?;
        if let Err(e) = std_stream.set_keepalive(Some(Duration::new(TCP_KEEPALIVE_SECS, 0))) {
            warn!("failed to set TCP keepalive: {}", e);
        }
        let stream = tokio::net::TcpStream::from_std(std_stream)?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY: {}", e);
        }

        Ok(stream)
    }
}

async fn within<T, F>(timeout: Duration, what: String, fut: F) -> Result<T, TransportError>
where
    F: std::future::Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(TransportError::from_io),
        Err(_) => Err(TransportError::timeout(format!(
            "{} took longer than {}ms",
            what,
            timeout.as_millis()
        ))),
    }
}

#[async_trait]
impl Transport for ModbusLink {
    fn set_unit(&mut self, unit: u8) {
        self.ctx.set_slave(Slave(unit));
    }

    async fn read_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        let what = format!("read {}+{} on {}", address, count, self.description);
        let words = within(
            self.timeout,
            what,
            self.ctx.read_holding_registers(address, count),
        )
        .await?;

        if words.len() != count as usize {
            return Err(TransportError::protocol(format!(
                "asked for {} registers at {}, got {}",
                count,
                address,
                words.len()
            )));
        }

        Ok(words)
    }

    async fn write_registers(&mut self, address: u16, values: &[u16]) -> Result<(), TransportError> {
        let what = format!("write {} on {}", address, self.description);
        match values {
            [single] => {
                within(
                    self.timeout,
                    what,
                    self.ctx.write_single_register(address, *single),
                )
                .await
            }
            _ => {
                within(
                    self.timeout,
                    what,
                    self.ctx.write_multiple_registers(address, values),
                )
                .await
            }
        }
    }
}
