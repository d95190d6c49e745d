//! UDP publisher for object events
//!
//! Fire-and-forget: a datagram that cannot be sent is logged and dropped,
//! the pipeline never waits on the network.

use crate::config::StreamingConfig;
use crate::error::{Result, TrackerError};
use crate::pipeline::ObjectListener;
use crate::tracking::{ObjectEvent, TrackedObject};
use serde::Serialize;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

/// Wire form of one event
#[derive(Debug, Serialize)]
pub struct EventMessage<'a> {
    pub sensor: &'a str,
    pub event: &'static str,
    pub object: &'a TrackedObject,
}

impl<'a> EventMessage<'a> {
    pub fn new(sensor: &'a str, event: &'a ObjectEvent) -> Self {
        Self {
            sensor,
            event: event.kind(),
            object: event.object(),
        }
    }
}

/// Sends every event to one target address.
///
/// Clones share the socket, so each sensor thread can own a handle.
#[derive(Debug, Clone)]
pub struct UdpEventPublisher {
    socket: Arc<UdpSocket>,
    target: SocketAddr,
}

impl UdpEventPublisher {
    pub fn new(bind: &str, target: &str) -> Result<Self> {
        let target = target
            .to_socket_addrs()
            .map_err(|e| TrackerError::Config(format!("Invalid stream target {}: {}", target, e)))?
            .next()
            .ok_or_else(|| TrackerError::Config(format!("Stream target {} did not resolve", target)))?;
        let socket = UdpSocket::bind(bind)?;
        log::info!(
            "Streaming events from {} to {}",
            socket.local_addr()?,
            target
        );
        Ok(Self {
            socket: Arc::new(socket),
            target,
        })
    }

    pub fn from_config(config: &StreamingConfig) -> Result<Self> {
        Self::new(&config.bind, &config.target)
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Serialise one event as a JSON datagram
    pub fn encode(sensor: &str, event: &ObjectEvent) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&EventMessage::new(sensor, event))?)
    }

    pub fn publish(&self, sensor: &str, event: &ObjectEvent) -> Result<()> {
        let datagram = Self::encode(sensor, event)?;
        self.socket.send_to(&datagram, self.target)?;
        Ok(())
    }
}

impl ObjectListener for UdpEventPublisher {
    fn on_event(&mut self, sensor: &str, event: &ObjectEvent) {
        if let Err(e) = self.publish(sensor, event) {
            log::debug!("[{}] dropped {} event: {}", sensor, event.kind(), e);
        }
    }
}
