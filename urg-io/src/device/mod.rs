//! URG device session
//!
//! [`UrgDevice`] is the consumer-facing half of one sensor link:
//!
//! - `connect()` returns immediately; a connect thread opens the transport
//!   and starts the reader thread, retrying after `reconnect_interval_ms`
//!   on failure or link loss.
//! - The reader thread decodes replies into a scan snapshot and info blocks
//!   and queues one [`DeviceEvent`] per reply.
//! - The consumer calls [`UrgDevice::tick`] once per frame to dequeue a
//!   single event. The tick also runs the watchdog: five consecutive ticks
//!   without a scan while scans are expected send `RS`. Once the reset is
//!   acknowledged a continuous measurement is restarted, or the laser is
//!   switched back on for polling.

mod reader;
mod session;

pub use session::DeviceStats;

use crate::config::{DeviceConfig, MeasurementMode};
use crate::scan::ScanFrame;
use crate::scip::{ParameterInfo, ScanRange, ScipCommand, StatusInfo, VersionInfo};
use crate::transport::{Connector, LinkConnector};
use crossbeam_channel::{Receiver, TryRecvError, unbounded};
use session::Session;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// Consecutive idle ticks before the watchdog resets the sensor
pub const WATCHDOG_IDLE_TICKS: u32 = 5;

/// Lifecycle event surfaced to the consumer, one per reply
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Connected,
    Disconnected,
    Version(VersionInfo),
    Parameters(ParameterInfo),
    Status(StatusInfo),
    /// `RS` acknowledged; laser and measurement are off
    ParametersReset,
    LaserOn,
    LaserOff,
    /// Continuous measurement acknowledged
    MeasurementStarted,
    /// A scan is available via [`UrgDevice::take_scan`]
    ScanReceived { timestamp: u32 },
}

/// One physical sensor
pub struct UrgDevice {
    session: Arc<Session>,
    events: Receiver<DeviceEvent>,

    /// Range of the continuous measurement the consumer asked for
    wanted_range: Option<ScanRange>,
    /// Scans are expected (continuous wanted or a poll outstanding)
    expecting_scans: bool,
    /// Single scans are being requested; the laser must stay on
    polling: bool,
    idle_ticks: u32,
    last_frame_count: u64,
    /// The watchdog sent `RS` and restarts measurement on its ack
    healing: bool,
}

impl UrgDevice {
    /// Device reaching the sensor over the configured TCP or serial link
    pub fn new(config: DeviceConfig) -> Self {
        let connector = LinkConnector::new(
            config.transport.clone(),
            config.connect_timeout(),
            config.read_timeout(),
        );
        Self::with_connector(config, Arc::new(connector))
    }

    /// Device using a custom connector (tests, replay)
    pub fn with_connector(config: DeviceConfig, connector: Arc<dyn Connector>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            session: Arc::new(Session::new(config, connector, tx)),
            events: rx,
            wanted_range: None,
            expecting_scans: false,
            polling: false,
            idle_ticks: 0,
            last_frame_count: 0,
            healing: false,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.session.config
    }

    pub fn endpoint(&self) -> String {
        self.session.endpoint()
    }

    /// Start connecting in the background; `Connected` is queued on success.
    pub fn connect(&self) {
        self.session.connect();
    }

    /// Close the link and cancel pending retries.
    ///
    /// Queues `Disconnected` if a link was up.
    pub fn disconnect(&mut self) {
        self.session.disconnect();
        self.wanted_range = None;
        self.expecting_scans = false;
        self.polling = false;
        self.healing = false;
        self.idle_ticks = 0;
    }

    pub fn is_connected(&self) -> bool {
        self.session.connected.load(Ordering::SeqCst)
    }

    pub fn is_connecting(&self) -> bool {
        self.session.connecting.load(Ordering::SeqCst)
    }

    pub fn is_laser_on(&self) -> bool {
        self.session.laser_on.load(Ordering::SeqCst)
    }

    pub fn is_measuring(&self) -> bool {
        self.session.measuring.load(Ordering::SeqCst)
    }

    pub fn version(&self) -> Option<VersionInfo> {
        self.session.version.lock().clone()
    }

    pub fn parameters(&self) -> Option<ParameterInfo> {
        self.session.parameters.lock().clone()
    }

    pub fn status(&self) -> Option<StatusInfo> {
        self.session.status.lock().clone()
    }

    pub fn stats(&self) -> DeviceStats {
        self.session.stats()
    }

    /// Newest scan without consuming it
    pub fn latest_scan(&self) -> Option<Arc<ScanFrame>> {
        self.session.scan.lock().clone()
    }

    /// Take the newest scan; `None` until the reader stores another one.
    pub fn take_scan(&self) -> Option<Arc<ScanFrame>> {
        self.session.scan.lock().take()
    }

    /// Dequeue at most one event and run the watchdog.
    pub fn tick(&mut self) -> Option<DeviceEvent> {
        let event = match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        };

        match &event {
            Some(DeviceEvent::ScanReceived { .. }) => {
                self.session.scan_event_pending.store(false, Ordering::SeqCst);
            }
            Some(DeviceEvent::ParametersReset) if self.healing => {
                self.healing = false;
                if let Some(range) = self.wanted_range {
                    log::info!("URG {}: restarting measurement after reset", self.endpoint());
                    self.send_measure(range);
                } else if self.polling {
                    log::info!("URG {}: laser back on after reset", self.endpoint());
                    self.laser_on();
                }
            }
            Some(DeviceEvent::Disconnected) => {
                self.healing = false;
                self.idle_ticks = 0;
                if self.wanted_range.is_none() {
                    self.expecting_scans = false;
                }
            }
            _ => {}
        }

        self.watchdog();
        event
    }

    fn watchdog(&mut self) {
        let frames = self.session.frames_received.load(Ordering::Relaxed);
        let progressed = frames != self.last_frame_count;
        self.last_frame_count = frames;

        if !self.expecting_scans || !self.is_connected() || progressed {
            self.idle_ticks = 0;
            return;
        }

        self.idle_ticks += 1;
        if self.idle_ticks >= WATCHDOG_IDLE_TICKS {
            self.idle_ticks = 0;
            log::warn!(
                "URG {}: no scans for {} ticks, resetting sensor",
                self.endpoint(),
                WATCHDOG_IDLE_TICKS
            );
            self.healing = true;
            self.session.send(&ScipCommand::Reset);
        }
    }

    pub fn request_version(&self) -> bool {
        self.session.send(&ScipCommand::Version)
    }

    pub fn request_parameters(&self) -> bool {
        self.session.send(&ScipCommand::Parameters)
    }

    pub fn request_status(&self) -> bool {
        self.session.send(&ScipCommand::Status)
    }

    pub fn laser_on(&self) -> bool {
        self.session.send(&ScipCommand::LaserOn)
    }

    /// `QT`: laser off, which also ends a continuous measurement
    pub fn laser_off(&mut self) -> bool {
        self.stop_measurement()
    }

    /// `RS`: back to power-on state. Forgets any wanted measurement.
    pub fn reset_parameters(&mut self) -> bool {
        self.wanted_range = None;
        self.expecting_scans = false;
        self.polling = false;
        self.healing = false;
        self.session.send(&ScipCommand::Reset)
    }

    /// Start continuous measurement (`MD`/`MS`/`ME` per the configured encoding).
    pub fn start_measurement(&mut self, range: ScanRange) -> bool {
        self.wanted_range = Some(range);
        self.expecting_scans = true;
        self.polling = false;
        self.idle_ticks = 0;
        self.send_measure(range)
    }

    fn send_measure(&self, range: ScanRange) -> bool {
        let config = &self.session.config;
        let sent = self.session.send(&ScipCommand::Measure {
            encoding: config.encoding,
            range,
            skip: config.skip,
            scans: 0,
        });
        if sent {
            self.session.measuring.store(true, Ordering::SeqCst);
        }
        sent
    }

    /// `QT`: stop continuous measurement
    pub fn stop_measurement(&mut self) -> bool {
        self.wanted_range = None;
        self.expecting_scans = false;
        self.polling = false;
        self.healing = false;
        self.session.send(&ScipCommand::LaserOff)
    }

    /// Request one scan (`GD`/`GS`/`GE` per the configured encoding).
    ///
    /// The sensor only answers while the laser is on (see [`Self::laser_on`]).
    pub fn acquire(&mut self, range: ScanRange) -> bool {
        let sent = self.session.send(&ScipCommand::Acquire {
            encoding: self.session.config.encoding,
            range,
        });
        if sent {
            self.expecting_scans = true;
            self.polling = true;
        }
        sent
    }

    /// Begin scanning in the configured mode: continuous starts the stream,
    /// polled issues the first request (the laser must already be on).
    pub fn start(&mut self, range: ScanRange) -> bool {
        match self.session.config.mode {
            MeasurementMode::Continuous => self.start_measurement(range),
            MeasurementMode::Polled => self.acquire(range),
        }
    }
}

impl Drop for UrgDevice {
    fn drop(&mut self) {
        self.session.disconnect();
    }
}
