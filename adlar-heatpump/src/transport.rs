//! Register transport: the connection to a controller.
//!
//! The transport owns timeouts and retries; callers above it issue one
//! logical read per register and never retry.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio_modbus::client::{Client, Context, Reader};
use tokio_modbus::prelude::*;
use tracing::{debug, warn};

use crate::entry::{ConnectionConfig, DeviceSettings, Parity};
use crate::registers::{Register, RegisterKind};

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Read failed: {0}")]
    Read(String),
    #[error("Modbus exception: {0}")]
    Exception(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Not connected")]
    NotConnected,
}

/// Connection to a single controller.
#[async_trait]
pub trait Transport: Send {
    /// Open the connection.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Read one 16-bit register.
    ///
    /// `Ok(None)` means the controller answered without a value.
    async fn read_register(&mut self, register: Register) -> Result<Option<u16>, TransportError>;

    /// Release the connection. Safe to call more than once.
    async fn close(&mut self);
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect().await
    }

    async fn read_register(&mut self, register: Register) -> Result<Option<u16>, TransportError> {
        (**self).read_register(register).await
    }

    async fn close(&mut self) {
        (**self).close().await
    }
}

/// Timeout and retry policy applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    pub timeout: Duration,
    /// Extra attempts after a failed read
    pub retries: u32,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1000),
            retries: 3,
        }
    }
}

/// Modbus TCP/RTU transport built on `tokio-modbus`.
pub struct ModbusTransport {
    connection: ConnectionConfig,
    unit_id: u8,
    options: TransportOptions,
    ctx: Option<Context>,
}

impl ModbusTransport {
    pub fn new(settings: &DeviceSettings, options: TransportOptions) -> Self {
        Self {
            connection: settings.connection.clone(),
            unit_id: settings.unit_id,
            options,
            ctx: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    async fn read_once(&mut self, register: Register) -> Result<Option<u16>, TransportError> {
        let timeout = self.options.timeout;
        let ctx = self.ctx.as_mut().ok_or(TransportError::NotConnected)?;

        let request = async {
            match register.kind {
                RegisterKind::Input => ctx.read_input_registers(register.address, 1).await,
                RegisterKind::Holding => ctx.read_holding_registers(register.address, 1).await,
            }
        };

        let words = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| TransportError::Read(e.to_string()))?
            .map_err(|e| TransportError::Exception(format!("{:?}", e)))?;

        Ok(words.first().copied())
    }
}

async fn open(
    connection: &ConnectionConfig,
    unit_id: u8,
    timeout: Duration,
) -> Result<Context, TransportError> {
    let slave = Slave(unit_id);

    match connection {
        ConnectionConfig::Tcp { host, port } => {
            let addr = resolve_addr(host, *port).await?;

            tokio::time::timeout(timeout, tcp::connect_slave(addr, slave))
                .await
                .map_err(|_| TransportError::Connection("Connection timeout".to_string()))?
                .map_err(|e| TransportError::Connection(e.to_string()))
        }
        ConnectionConfig::Rtu {
            port,
            baud_rate,
            data_bits,
            parity,
            stop_bits,
        } => {
            let parity = match parity {
                Parity::None => tokio_serial::Parity::None,
                Parity::Even => tokio_serial::Parity::Even,
                Parity::Odd => tokio_serial::Parity::Odd,
            };

            let stop_bits = match stop_bits {
                2 => tokio_serial::StopBits::Two,
                _ => tokio_serial::StopBits::One,
            };

            let data_bits = match data_bits {
                5 => tokio_serial::DataBits::Five,
                6 => tokio_serial::DataBits::Six,
                7 => tokio_serial::DataBits::Seven,
                _ => tokio_serial::DataBits::Eight,
            };

            let builder = tokio_serial::new(port, *baud_rate)
                .parity(parity)
                .stop_bits(stop_bits)
                .data_bits(data_bits)
                .timeout(timeout);

            let serial = tokio_serial::SerialStream::open(&builder)
                .map_err(|e| TransportError::Connection(format!("Serial open failed: {}", e)))?;

            Ok(rtu::attach_slave(serial, slave))
        }
    }
}

async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    if let Ok(addr) = format!("{}:{}", host, port).parse::<SocketAddr>() {
        return Ok(addr);
    }

    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| TransportError::Connection(format!("Invalid address: {}", e)))?
        .next()
        .ok_or_else(|| TransportError::Connection(format!("No address found for '{}'", host)))
}

#[async_trait]
impl Transport for ModbusTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }
        debug!(connection = ?self.connection, unit = self.unit_id, "Opening Modbus connection");
        let ctx = open(&self.connection, self.unit_id, self.options.timeout).await?;
        self.ctx = Some(ctx);
        Ok(())
    }

    async fn read_register(&mut self, register: Register) -> Result<Option<u16>, TransportError> {
        let mut attempt = 0;
        loop {
            match self.read_once(register).await {
                Ok(value) => return Ok(value),
                Err(TransportError::NotConnected) => return Err(TransportError::NotConnected),
                Err(e) if attempt < self.options.retries => {
                    attempt += 1;
                    warn!(
                        "Read of {} failed (attempt {}/{}): {}",
                        register,
                        attempt,
                        self.options.retries + 1,
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                debug!("Error while closing Modbus connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_settings(host: &str) -> DeviceSettings {
        DeviceSettings {
            name: "hp".to_string(),
            board_type: "AURORA".to_string(),
            unit_id: 1,
            connection: ConnectionConfig::Tcp {
                host: host.to_string(),
                port: 502,
            },
        }
    }

    #[tokio::test]
    async fn test_read_before_connect() {
        let mut transport =
            ModbusTransport::new(&tcp_settings("127.0.0.1"), TransportOptions::default());
        assert!(!transport.is_connected());
        let result = transport.read_register(Register::input(0)).await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_without_connection() {
        let mut transport =
            ModbusTransport::new(&tcp_settings("127.0.0.1"), TransportOptions::default());
        transport.close().await;
        transport.close().await;
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_resolve_literal_addr() {
        let addr = resolve_addr("192.168.1.50", 502).await.unwrap();
        assert_eq!(addr.to_string(), "192.168.1.50:502");
    }

    #[test]
    fn test_default_options() {
        let options = TransportOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(1));
        assert_eq!(options.retries, 3);
    }
}
