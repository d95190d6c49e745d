//! Mock transport for testing

use super::{Connector, Transport};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Emulated read timeout when no data is queued
const IDLE_READ_DELAY: Duration = Duration::from_millis(1);

/// In-memory transport; clones share the same buffers.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    closed: bool,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Get all written data
    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().write_buffer.clone()
    }

    /// Written data as text, for asserting on SCIP request lines
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().write_buffer).into_owned()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.inner.lock().write_buffer.clear();
    }

    /// Simulate the peer closing the link: queued data is still delivered,
    /// then reads fail with [`Error::Disconnected`].
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let available = {
            let mut inner = self.inner.lock();
            if inner.read_buffer.is_empty() && inner.closed {
                return Err(Error::Disconnected);
            }
            let available = inner.read_buffer.len().min(buffer.len());
            for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..available)) {
                *slot = byte;
            }
            available
        };
        if available == 0 {
            thread::sleep(IDLE_READ_DELAY);
        }
        Ok(available)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::Disconnected);
        }
        inner.write_buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(self.clone()))
    }

    fn shutdown(&mut self) {
        self.close();
    }
}

/// Hands out a fresh [`MockTransport`] per connection attempt.
///
/// The first `fail_first` attempts fail, which exercises the retry path.
#[derive(Clone, Default)]
pub struct MockConnector {
    links: Arc<Mutex<Vec<MockTransport>>>,
    attempts: Arc<AtomicUsize>,
    fail_first: usize,
    refuse: Arc<AtomicBool>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(fail_first: usize) -> Self {
        Self {
            fail_first,
            ..Self::default()
        }
    }

    /// Refuse every attempt while set
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Link handed out by the most recent successful attempt
    pub fn last_link(&self) -> Option<MockTransport> {
        self.links.lock().last().cloned()
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().len()
    }
}

impl Connector for MockConnector {
    fn open(&self) -> Result<Box<dyn Transport>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first || self.refuse.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock connection refused",
            )));
        }
        let link = MockTransport::new();
        self.links.lock().push(link.clone());
        Ok(Box::new(link))
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
