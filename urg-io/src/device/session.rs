//! Shared link state of one device
//!
//! Owned jointly (via `Arc`) by the consumer-side [`super::UrgDevice`], the
//! connect/retry threads and the reader thread. Flags are atomics; the link
//! itself (writer half + reader handle) sits behind one mutex so install and
//! teardown never interleave.

use super::DeviceEvent;
use super::reader::reader_loop;
use crate::config::DeviceConfig;
use crate::error::Result;
use crate::scan::ScanFrame;
use crate::scip::{ParameterInfo, ScipCommand, StatusInfo, VersionInfo};
use crate::transport::{Connector, Transport};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Granularity at which a pending retry re-checks for cancellation
const RETRY_POLL: Duration = Duration::from_millis(50);

/// Background reader of one link
struct ReaderHandle {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// The currently installed link
#[derive(Default)]
struct LinkSlot {
    writer: Option<Box<dyn Transport>>,
    reader: Option<ReaderHandle>,
    /// Bumped on every install; a reader only tears down its own link
    generation: u64,
}

/// Frame counters, for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub frames_received: u64,
    pub replies_dropped: u64,
}

pub(super) struct Session {
    pub config: DeviceConfig,
    connector: Arc<dyn Connector>,
    events: Sender<DeviceEvent>,
    link: Mutex<LinkSlot>,

    pub connected: AtomicBool,
    pub connecting: AtomicBool,
    retry_pending: AtomicBool,
    retry_epoch: AtomicU64,
    pub laser_on: AtomicBool,
    pub measuring: AtomicBool,
    /// A `ScanReceived` event is queued and not yet consumed
    pub scan_event_pending: AtomicBool,
    pub frames_received: AtomicU64,
    pub replies_dropped: AtomicU64,

    pub version: Mutex<Option<VersionInfo>>,
    pub parameters: Mutex<Option<ParameterInfo>>,
    pub status: Mutex<Option<StatusInfo>>,
    pub scan: Mutex<Option<Arc<ScanFrame>>>,
}

impl Session {
    pub fn new(
        config: DeviceConfig,
        connector: Arc<dyn Connector>,
        events: Sender<DeviceEvent>,
    ) -> Self {
        Self {
            config,
            connector,
            events,
            link: Mutex::new(LinkSlot::default()),
            connected: AtomicBool::new(false),
            connecting: AtomicBool::new(false),
            retry_pending: AtomicBool::new(false),
            retry_epoch: AtomicU64::new(0),
            laser_on: AtomicBool::new(false),
            measuring: AtomicBool::new(false),
            scan_event_pending: AtomicBool::new(false),
            frames_received: AtomicU64::new(0),
            replies_dropped: AtomicU64::new(0),
            version: Mutex::new(None),
            parameters: Mutex::new(None),
            status: Mutex::new(None),
            scan: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> String {
        self.connector.describe()
    }

    pub fn emit(&self, event: DeviceEvent) {
        // The receiver lives in UrgDevice; a send can only fail while it is being dropped
        if self.events.send(event).is_err() {
            log::trace!("URG {}: event dropped, device closed", self.endpoint());
        }
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            replies_dropped: self.replies_dropped.load(Ordering::Relaxed),
        }
    }

    /// Start a connection attempt on a background thread.
    ///
    /// No-op while connected or while another attempt is in flight.
    pub fn connect(self: &Arc<Self>) {
        if self.connected.load(Ordering::SeqCst) {
            return;
        }
        if self.connecting.swap(true, Ordering::SeqCst) {
            return;
        }
        let session = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("urg-connect".to_string())
            .spawn(move || session.open_link());
        if let Err(e) = spawned {
            log::error!("URG {}: failed to spawn connect thread: {}", self.endpoint(), e);
            self.connecting.store(false, Ordering::SeqCst);
        }
    }

    /// Body of the connect thread
    fn open_link(self: Arc<Self>) {
        let endpoint = self.endpoint();
        log::info!("URG {}: connecting", endpoint);

        let (writer, reader) = match self.connector.open().and_then(|link| {
            let reader = link.try_clone()?;
            Ok((link, reader))
        }) {
            Ok(halves) => halves,
            Err(e) => {
                log::warn!("URG {}: connection failed: {}", endpoint, e);
                self.abandon_attempt();
                return;
            }
        };

        if let Err(e) = self.install(writer, reader) {
            log::error!("URG {}: failed to start reader: {}", endpoint, e);
            self.abandon_attempt();
        }
    }

    /// End a failed attempt, retrying unless disconnect() cancelled it meanwhile
    fn abandon_attempt(self: &Arc<Self>) {
        let _slot = self.link.lock();
        if self.connecting.swap(false, Ordering::SeqCst) {
            self.schedule_retry();
        }
    }

    fn install(self: &Arc<Self>, mut writer: Box<dyn Transport>, reader: Box<dyn Transport>) -> Result<()> {
        let mut slot = self.link.lock();

        // disconnect() clears `connecting` to cancel an attempt in flight
        if !self.connecting.load(Ordering::SeqCst) {
            log::info!("URG {}: connection cancelled", self.endpoint());
            writer.shutdown();
            return Ok(());
        }

        let generation = slot.generation + 1;
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let session = Arc::clone(self);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("urg-reader".to_string())
                .spawn(move || reader_loop(reader, session, shutdown, generation))?
        };

        slot.generation = generation;
        slot.writer = Some(writer);
        slot.reader = Some(ReaderHandle { shutdown, handle });
        self.scan_event_pending.store(false, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        self.connecting.store(false, Ordering::SeqCst);
        log::info!("URG {}: connected", self.endpoint());
        self.emit(DeviceEvent::Connected);
        Ok(())
    }

    /// Schedule one delayed reconnect attempt if an interval is configured.
    ///
    /// Callers hold the link lock so a concurrent disconnect() either sees
    /// the retry and cancels it or runs before it is scheduled.
    fn schedule_retry(self: &Arc<Self>) {
        let Some(interval) = self.config.reconnect_interval() else {
            return;
        };
        let epoch = self.retry_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.retry_pending.store(true, Ordering::SeqCst);
        log::debug!("URG {}: retry in {:?}", self.endpoint(), interval);

        let session = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("urg-retry".to_string())
            .spawn(move || {
                let deadline = Instant::now() + interval;
                let still_wanted = |s: &Session| {
                    s.retry_pending.load(Ordering::SeqCst)
                        && s.retry_epoch.load(Ordering::SeqCst) == epoch
                };
                while Instant::now() < deadline {
                    if !still_wanted(session.as_ref()) {
                        return;
                    }
                    thread::sleep(RETRY_POLL.min(deadline.saturating_duration_since(Instant::now())));
                }
                let _slot = session.link.lock();
                if !still_wanted(session.as_ref()) {
                    return;
                }
                session.retry_pending.store(false, Ordering::SeqCst);
                if session.connected.load(Ordering::SeqCst)
                    || session.connecting.load(Ordering::SeqCst)
                {
                    return;
                }
                session.connect();
            });
        if let Err(e) = spawned {
            log::error!("URG {}: failed to spawn retry thread: {}", self.endpoint(), e);
            self.retry_pending.store(false, Ordering::SeqCst);
        }
    }

    /// Explicit disconnect: cancels retries, stops the reader and closes the link.
    pub fn disconnect(&self) {
        let (writer, reader) = {
            let mut slot = self.link.lock();
            self.connecting.store(false, Ordering::SeqCst);
            self.retry_pending.store(false, Ordering::SeqCst);
            self.retry_epoch.fetch_add(1, Ordering::SeqCst);
            (slot.writer.take(), slot.reader.take())
        };
        if let Some(reader) = &reader {
            reader.shutdown.store(true, Ordering::SeqCst);
        }
        if let Some(mut writer) = writer {
            writer.shutdown();
        }
        if let Some(reader) = reader
            && reader.handle.thread().id() != thread::current().id()
            && reader.handle.join().is_err()
        {
            log::error!("URG {}: reader thread panicked", self.endpoint());
        }

        self.reset_link_state();
    }

    /// Called by the reader thread when its link fails.
    pub fn link_lost(self: &Arc<Self>, generation: u64) {
        let writer = {
            let mut slot = self.link.lock();
            if slot.generation != generation || slot.reader.is_none() {
                return;
            }
            // Our own thread; dropping the handle detaches it
            slot.reader.take();
            self.schedule_retry();
            slot.writer.take()
        };
        if let Some(mut writer) = writer {
            writer.shutdown();
        }
        self.reset_link_state();
    }

    fn reset_link_state(&self) {
        self.measuring.store(false, Ordering::SeqCst);
        self.laser_on.store(false, Ordering::SeqCst);
        *self.scan.lock() = None;
        if self.connected.swap(false, Ordering::SeqCst) {
            log::info!("URG {}: disconnected", self.endpoint());
            self.emit(DeviceEvent::Disconnected);
        }
    }

    /// Send one request. Returns false when there is no link.
    pub fn send(self: &Arc<Self>, command: &ScipCommand) -> bool {
        let line = command.encode();
        let (result, generation) = {
            let mut slot = self.link.lock();
            let generation = slot.generation;
            let Some(writer) = slot.writer.as_mut() else {
                log::debug!(
                    "URG {}: {} ignored while disconnected",
                    self.endpoint(),
                    command.code()
                );
                return false;
            };
            (writer.write_all(line.as_bytes()), generation)
        };
        match result {
            Ok(()) => {
                log::trace!("URG {}: sent {}", self.endpoint(), line.trim_end());
                true
            }
            Err(e) => {
                log::warn!("URG {}: write of {} failed: {}", self.endpoint(), command.code(), e);
                self.link_lost(generation);
                false
            }
        }
    }
}
