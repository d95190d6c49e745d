//! Reader thread
//!
//! Reads the link in slices of the configured read timeout, assembles
//! complete replies and applies each one to the session: info blocks and
//! scans are stored, flags updated, and one event is queued per reply.

use super::DeviceEvent;
use super::session::Session;
use crate::scip::{CommandCode, Reply, ReplyAssembler, parse_reply};
use crate::transport::Transport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const READ_CHUNK: usize = 4096;

pub(super) fn reader_loop(
    mut link: Box<dyn Transport>,
    session: Arc<Session>,
    shutdown: Arc<AtomicBool>,
    generation: u64,
) {
    let mut assembler = ReplyAssembler::new();
    let mut buffer = [0u8; READ_CHUNK];
    let endpoint = session.endpoint();

    log::debug!("URG {}: reader started", endpoint);

    while !shutdown.load(Ordering::Relaxed) {
        match link.read(&mut buffer) {
            Ok(0) => {}
            Ok(n) => {
                for reply in assembler.push(&buffer[..n]) {
                    apply_reply(&session, &reply);
                }
            }
            Err(e) => {
                if !shutdown.load(Ordering::Relaxed) {
                    log::warn!("URG {}: link lost: {}", endpoint, e);
                    session.link_lost(generation);
                }
                break;
            }
        }
    }

    let stats = session.stats();
    log::debug!(
        "URG {}: reader exiting ({} frames, {} replies dropped)",
        endpoint,
        stats.frames_received,
        stats.replies_dropped
    );
}

/// Apply one complete reply to the session
pub(super) fn apply_reply(session: &Session, lines: &[String]) {
    let reply = match parse_reply(lines, session.config.verify_checksum) {
        Ok(reply) => reply,
        Err(e) => {
            session.replies_dropped.fetch_add(1, Ordering::Relaxed);
            log::debug!("URG {}: dropping reply: {}", session.endpoint(), e);
            // A failed measurement leaves no stale scan behind
            let measurement = lines
                .first()
                .and_then(|echo| CommandCode::from_echo(echo))
                .is_some_and(|code| code.is_measurement());
            if measurement {
                *session.scan.lock() = None;
            }
            return;
        }
    };

    let event = match reply {
        Reply::Version(info) => {
            log::info!(
                "URG {}: {} firmware {} ({})",
                session.endpoint(),
                info.product,
                info.firmware,
                info.protocol
            );
            *session.version.lock() = Some(info.clone());
            DeviceEvent::Version(info)
        }
        Reply::Parameters(info) => {
            log::info!(
                "URG {}: {} steps {}..{} front {} of {}, range {}..{}mm",
                session.endpoint(),
                info.model,
                info.min_step,
                info.max_step,
                info.front_step,
                info.area_total,
                info.min_distance,
                info.max_distance
            );
            *session.parameters.lock() = Some(info.clone());
            DeviceEvent::Parameters(info)
        }
        Reply::Status(info) => {
            log::debug!("URG {}: status {}", session.endpoint(), info.status);
            *session.status.lock() = Some(info.clone());
            DeviceEvent::Status(info)
        }
        Reply::LaserOn => {
            session.laser_on.store(true, Ordering::SeqCst);
            DeviceEvent::LaserOn
        }
        Reply::LaserOff => {
            session.laser_on.store(false, Ordering::SeqCst);
            session.measuring.store(false, Ordering::SeqCst);
            DeviceEvent::LaserOff
        }
        Reply::Reset => {
            session.laser_on.store(false, Ordering::SeqCst);
            session.measuring.store(false, Ordering::SeqCst);
            DeviceEvent::ParametersReset
        }
        Reply::MeasurementStarted(code) => {
            log::debug!("URG {}: {} stream started", session.endpoint(), code);
            session.laser_on.store(true, Ordering::SeqCst);
            session.measuring.store(true, Ordering::SeqCst);
            DeviceEvent::MeasurementStarted
        }
        Reply::Scan(frame) => {
            let timestamp = frame.timestamp;
            log::trace!(
                "URG {}: scan t={} with {} samples",
                session.endpoint(),
                timestamp,
                frame.step_count()
            );
            *session.scan.lock() = Some(Arc::new(frame));
            session.frames_received.fetch_add(1, Ordering::Relaxed);
            // One queued scan notification at a time; the snapshot always holds the newest
            if session.scan_event_pending.swap(true, Ordering::SeqCst) {
                return;
            }
            DeviceEvent::ScanReceived { timestamp }
        }
    };
    session.emit(event);
}
