//! Transport layer for I/O abstraction
//!
//! A [`Transport`] is one duplex byte stream to a sensor. The device keeps the
//! original handle for writing commands and gives a [`Transport::try_clone`]
//! to the reader thread, so blocking reads never hold up a write.

use crate::config::TransportConfig;
use crate::error::Result;
use std::time::Duration;

mod mock;
mod serial;
mod tcp;

pub use mock::{MockConnector, MockTransport};
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

/// Transport trait for device communication
pub trait Transport: Send {
    /// Read data into buffer.
    ///
    /// Returns `Ok(0)` when nothing arrived within the read timeout and
    /// [`crate::Error::Disconnected`] once the peer has closed the link.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Second handle on the same link
    fn try_clone(&self) -> Result<Box<dyn Transport>>;

    /// Close the link, waking any reader blocked on it
    fn shutdown(&mut self) {}

    /// Write a whole buffer, retrying short writes
    fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = self.write(data)?;
            if n == 0 {
                return Err(crate::Error::Disconnected);
            }
            data = &data[n..];
        }
        self.flush()
    }
}

/// Opens transports; the seam where tests substitute an in-memory link
pub trait Connector: Send + Sync {
    fn open(&self) -> Result<Box<dyn Transport>>;

    /// Endpoint description for log lines
    fn describe(&self) -> String;
}

/// Opens the TCP or serial link named in the configuration
#[derive(Debug, Clone)]
pub struct LinkConnector {
    transport: TransportConfig,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl LinkConnector {
    pub fn new(transport: TransportConfig, connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            transport,
            connect_timeout,
            read_timeout,
        }
    }
}

impl Connector for LinkConnector {
    fn open(&self) -> Result<Box<dyn Transport>> {
        match &self.transport {
            TransportConfig::Ethernet { address, port } => Ok(Box::new(TcpTransport::connect(
                address,
                *port,
                self.connect_timeout,
                self.read_timeout,
            )?)),
            TransportConfig::Serial { port, baud_rate } => Ok(Box::new(SerialTransport::open(
                port,
                *baud_rate,
                self.read_timeout,
            )?)),
        }
    }

    fn describe(&self) -> String {
        self.transport.endpoint()
    }
}
