//! TCP transport for Ethernet URG models

use super::Transport;
use crate::error::{Error, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// TCP transport
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect with timeout; reads block for at most `read_timeout`.
    pub fn connect(
        address: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        let addr: SocketAddr = (address, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Config(format!("Invalid address: {}:{}", address, port)))?;
        let stream = TcpStream::connect_timeout(&addr, connect_timeout)?;
        stream.set_read_timeout(Some(read_timeout))?;
        stream.set_nodelay(true)?;

        log::info!("Connected to {}", addr);
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.stream.read(buffer) {
            Ok(0) => Err(Error::Disconnected),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                Ok(0)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.stream.write(data)?)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(TcpTransport {
            stream: self.stream.try_clone()?,
        }))
    }

    fn shutdown(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
