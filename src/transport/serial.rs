use std::io::{self, Read, Write};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::info;

use crate::core::{Error, Result, SerialConfig};
use super::Transport;

/// Serial line to the bus: 8 data bits, even parity, 1 stop bit
pub struct SerialTransport {
    /// Open port
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Opens the configured device
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(config.device.as_str(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::Even)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| Error::serial(format!("Failed to open {}: {}", config.device, e)))?;

        info!(device = %config.device, baud = config.baud_rate, "Opened bus");
        Ok(Self::from_port(port))
    }

    /// Wraps an already configured port
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        SerialTransport { port }
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.port.name())
            .finish_non_exhaustive()
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            // A serial line has no end of stream; a zero read is an empty wait.
            Ok(n) => Ok(n),
            Err(e) if is_empty_wait(&e) => Ok(0),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        Ok(())
    }
}

fn is_empty_wait(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
