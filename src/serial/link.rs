use std::io::{Read, Write};
use std::time::Duration;

use async_trait::async_trait;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use super::{Result, SerialError};

/// Read timeout applied to every port we open.
pub const SERIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Line framing for a serial port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub timeout: Duration,
}

/// Byte-level access to an open serial line.
///
/// This is the minimum the projector protocol needs: blind writes, a count of
/// buffered bytes and single-byte reads, so replies can be drained without
/// blocking until the read timeout.
pub trait SerialLink: Send {
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    fn bytes_available(&mut self) -> Result<usize>;

    fn read_byte(&mut self) -> Result<u8>;

    fn close(&mut self);
}

/// Opens serial links; the controller holds one so it can reconnect.
#[async_trait]
pub trait LinkOpener: Send + Sync {
    async fn open(&self, port_name: &str, settings: SerialSettings) -> Result<Box<dyn SerialLink>>;
}

/// `serialport`-backed link.
pub struct NativeLink {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl NativeLink {
    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(SerialError::NotConnected)
    }
}

impl SerialLink for NativeLink {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.port()?.bytes_to_read()? as usize)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.port()?.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            log::info!("Closed serial port {}", self.port_name);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLinkOpener;

#[async_trait]
impl LinkOpener for NativeLinkOpener {
    async fn open(&self, port_name: &str, settings: SerialSettings) -> Result<Box<dyn SerialLink>> {
        let name = port_name.to_string();

        // Opening a tty can block on some drivers
        let port = tokio::task::spawn_blocking(move || {
            serialport::new(&name, settings.baud_rate)
                .data_bits(settings.data_bits)
                .parity(settings.parity)
                .stop_bits(settings.stop_bits)
                .flow_control(FlowControl::None)
                .timeout(settings.timeout)
                .open()
        })
        .await
        .map_err(|e| SerialError::ConnectionFailed(format!("open task failed: {}", e)))?
        .map_err(|e| SerialError::ConnectionFailed(format!("{}: {}", port_name, e)))?;

        log::info!("Opened serial port {} at {} baud", port_name, settings.baud_rate);
        Ok(Box::new(NativeLink {
            port_name: port_name.to_string(),
            port: Some(port),
        }))
    }
}
