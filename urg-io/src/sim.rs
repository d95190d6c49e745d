//! Simulated SCIP sensor
//!
//! Serves the SCIP 2.0 command set over a local TCP socket so the device
//! layer and everything above it can run without hardware. The scene is a
//! distance per step over the sensor's full step range; continuous
//! measurements stream it at the configured motor speed.
//!
//! ```text
//! client                    simulator
//!   VV / PP / II   ──►  info block
//!   BM / QT / RS   ──►  status only
//!   GD/GS/GE...    ──►  one scan
//!   MD/MS/ME...    ──►  "00" ack, then "99" scans every 60000/rpm ms
//! ```

use crate::error::Result;
use crate::scip::codec::{checksum, encode_6bit, encode_data_lines, with_checksum};
use crate::scip::{CommandCode, ParameterInfo, ScanRange};
use parking_lot::Mutex;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Poll interval of the accept loop and client reads
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Strength reported for every sample of `GE`/`ME` scans
const SIMULATED_STRENGTH: u32 = 1000;

struct SimShared {
    parameters: ParameterInfo,
    /// Distance per step, indexed from step 0
    scene: Mutex<Vec<u32>>,
    /// Stop streaming scans while keeping the link up
    muted: AtomicBool,
    client: Mutex<Option<TcpStream>>,
    connections: AtomicUsize,
    commands: Mutex<Vec<String>>,
    started: Instant,
}

/// A SCIP sensor on `127.0.0.1:<ephemeral port>`
pub struct SimulatedSensor {
    address: SocketAddr,
    shared: Arc<SimShared>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimulatedSensor {
    /// Start serving with the given geometry; every step reads `max_distance`.
    pub fn start(parameters: ParameterInfo) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let address = listener.local_addr()?;

        let scene = vec![parameters.max_distance; parameters.max_step as usize + 1];
        let shared = Arc::new(SimShared {
            parameters,
            scene: Mutex::new(scene),
            muted: AtomicBool::new(false),
            client: Mutex::new(None),
            connections: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
            started: Instant::now(),
        });
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let shared = Arc::clone(&shared);
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("urg-sim".to_string())
                .spawn(move || accept_loop(listener, shared, shutdown))?
        };

        log::info!("Simulated URG listening on {}", address);
        Ok(Self {
            address,
            shared,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn parameters(&self) -> &ParameterInfo {
        &self.shared.parameters
    }

    /// Replace the scene. Missing steps read `max_distance`.
    pub fn set_scene(&self, distances: Vec<u32>) {
        let mut scene = self.shared.scene.lock();
        let len = scene.len();
        *scene = distances;
        scene.resize(len, self.shared.parameters.max_distance);
    }

    /// Set `steps` (inclusive) to `distance`
    pub fn place_object(&self, first_step: u32, last_step: u32, distance: u32) {
        let mut scene = self.shared.scene.lock();
        for step in first_step..=last_step {
            if let Some(slot) = scene.get_mut(step as usize) {
                *slot = distance;
            }
        }
    }

    /// Stop (or resume) streaming scans without dropping the link
    pub fn set_muted(&self, muted: bool) {
        self.shared.muted.store(muted, Ordering::SeqCst);
    }

    /// Close the current client connection from the sensor side
    pub fn drop_connection(&self) {
        if let Some(stream) = self.shared.client.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Number of accepted connections so far
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Request lines received so far, in order
    pub fn received_commands(&self) -> Vec<String> {
        self.shared.commands.lock().clone()
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.drop_connection();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("Simulated URG thread panicked");
        }
    }
}

impl Drop for SimulatedSensor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(listener: TcpListener, shared: Arc<SimShared>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                log::debug!("Simulated URG: client {}", peer);
                shared.connections.fetch_add(1, Ordering::SeqCst);
                if let Err(e) = serve_client(stream, &shared, &shutdown) {
                    log::debug!("Simulated URG: client {} ended: {}", peer, e);
                }
                shared.client.lock().take();
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                log::warn!("Simulated URG: accept failed: {}", e);
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// An active `MD`/`MS`/`ME` stream
struct Stream {
    code: CommandCode,
    range: ScanRange,
    skip: u32,
    /// Scans left to send; `None` streams until stopped
    remaining: Option<u32>,
    next_scan: Instant,
}

struct ClientState {
    laser_on: bool,
    stream: Option<Stream>,
}

fn serve_client(
    mut stream: TcpStream,
    shared: &SimShared,
    shutdown: &AtomicBool,
) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(POLL_INTERVAL))?;
    stream.set_nodelay(true)?;
    *shared.client.lock() = Some(stream.try_clone()?);

    let mut state = ClientState {
        laser_on: false,
        stream: None,
    };
    let mut pending = Vec::new();
    let mut buffer = [0u8; 256];

    while !shutdown.load(Ordering::Relaxed) {
        match stream.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => pending.extend_from_slice(&buffer[..n]),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(e) => return Err(e),
        }

        while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            let request = String::from_utf8_lossy(&line).trim_end().to_string();
            if request.is_empty() {
                continue;
            }
            shared.commands.lock().push(request.clone());
            let reply = handle_request(&request, shared, &mut state);
            stream.write_all(reply.as_bytes())?;
        }

        if let Some(scan) = next_stream_scan(shared, &mut state) {
            stream.write_all(scan.as_bytes())?;
        }
    }
    Ok(())
}

/// Status a single-scan request gets while the laser is off
const LASER_OFF_STATUS: &str = "10";

fn status_reply(echo: &str, status: &str) -> String {
    format!("{}\n{}\n\n", echo, with_checksum(status))
}

fn info_reply(echo: &str, fields: &[(&str, String)]) -> String {
    let mut reply = format!("{}\n{}\n", echo, with_checksum("00"));
    for (key, value) in fields {
        let body = format!("{}:{}", key, value);
        reply.push_str(&format!("{};{}\n", body, checksum(body.as_bytes()) as char));
    }
    reply.push('\n');
    reply
}

fn parse_range(request: &str) -> Option<ScanRange> {
    let start = request.get(2..6)?.parse().ok()?;
    let end = request.get(6..10)?.parse().ok()?;
    let group = request.get(10..12)?.parse().ok()?;
    Some(ScanRange::new(start, end, group))
}

fn handle_request(request: &str, shared: &SimShared, state: &mut ClientState) -> String {
    let params = &shared.parameters;
    let Some(code) = CommandCode::from_echo(request) else {
        return status_reply(request, "0E");
    };

    match code {
        CommandCode::Vv => info_reply(
            request,
            &[
                ("VEND", "Hokuyo Automatic Co., Ltd.".to_string()),
                ("PROD", format!("SOKUIKI Sensor {}", params.model)),
                ("FIRM", "1.0.0(simulated)".to_string()),
                ("PROT", "SCIP 2.2".to_string()),
                ("SERI", "SIM00001".to_string()),
            ],
        ),
        CommandCode::Pp => info_reply(
            request,
            &[
                ("MODL", params.model.clone()),
                ("DMIN", params.min_distance.to_string()),
                ("DMAX", params.max_distance.to_string()),
                ("ARES", params.area_total.to_string()),
                ("AMIN", params.min_step.to_string()),
                ("AMAX", params.max_step.to_string()),
                ("AFRT", params.front_step.to_string()),
                ("SCAN", params.scan_rpm.to_string()),
            ],
        ),
        CommandCode::Ii => info_reply(
            request,
            &[
                ("MODL", params.model.clone()),
                ("LASR", if state.laser_on { "ON" } else { "OFF" }.to_string()),
                ("SCSP", format!("{}[rpm]", params.scan_rpm)),
                (
                    "MESM",
                    if state.stream.is_some() {
                        "Measuring by Normal Mode"
                    } else {
                        "Idle"
                    }
                    .to_string(),
                ),
                ("SBPS", "Ethernet 100[Mbps]".to_string()),
                ("TIME", format!("{:06X}", sensor_time(shared))),
                ("STAT", "Stable 000 no error.".to_string()),
            ],
        ),
        CommandCode::Bm => {
            let status = if state.laser_on { "02" } else { "00" };
            state.laser_on = true;
            status_reply(request, status)
        }
        CommandCode::Qt | CommandCode::Rs => {
            state.laser_on = false;
            state.stream = None;
            status_reply(request, "00")
        }
        CommandCode::Gd | CommandCode::Gs | CommandCode::Ge if !state.laser_on => {
            status_reply(request, LASER_OFF_STATUS)
        }
        CommandCode::Gd | CommandCode::Gs | CommandCode::Ge => match parse_range(request) {
            Some(range) if range_is_valid(params, &range) => {
                scan_reply(request, "00", code, &range, shared)
            }
            _ => status_reply(request, "0C"),
        },
        CommandCode::Md | CommandCode::Ms | CommandCode::Me => {
            let range = parse_range(request).filter(|r| range_is_valid(params, r));
            let skip = request.get(12..13).and_then(|s| s.parse().ok());
            let scans = request.get(13..15).and_then(|s| s.parse::<u32>().ok());
            match (range, skip, scans) {
                (Some(range), Some(skip), Some(scans)) => {
                    state.laser_on = true;
                    state.stream = Some(Stream {
                        code,
                        range,
                        skip,
                        remaining: (scans > 0).then_some(scans),
                        next_scan: Instant::now(),
                    });
                    status_reply(request, "00")
                }
                _ => status_reply(request, "0C"),
            }
        }
    }
}

fn range_is_valid(params: &ParameterInfo, range: &ScanRange) -> bool {
    range.start_step >= params.min_step
        && range.end_step <= params.max_step
        && range.start_step <= range.end_step
}

fn scan_period(params: &ParameterInfo) -> Duration {
    Duration::from_millis(60_000 / params.scan_rpm.max(1) as u64)
}

fn sensor_time(shared: &SimShared) -> u32 {
    (shared.started.elapsed().as_millis() as u32) & 0x00FF_FFFF
}

fn next_stream_scan(shared: &SimShared, state: &mut ClientState) -> Option<String> {
    let stream = state.stream.as_mut()?;
    let now = Instant::now();
    if now < stream.next_scan || shared.muted.load(Ordering::SeqCst) {
        return None;
    }
    stream.next_scan = now + scan_period(&shared.parameters) * (stream.skip + 1);

    let remaining = match stream.remaining {
        Some(0) => return None,
        Some(n) => Some(n - 1),
        None => None,
    };
    stream.remaining = remaining;

    let echo = format!(
        "{}{:04}{:04}{:02}{:01}{:02}",
        stream.code,
        stream.range.start_step,
        stream.range.end_step,
        stream.range.group_size,
        stream.skip,
        remaining.unwrap_or(0)
    );
    let code = stream.code;
    let range = stream.range;
    if remaining == Some(0) {
        state.stream = None;
    }
    Some(scan_reply(&echo, "99", code, &range, shared))
}

fn scan_reply(
    echo: &str,
    status: &str,
    code: CommandCode,
    range: &ScanRange,
    shared: &SimShared,
) -> String {
    let block = code.block_size();
    let max_value = if block == 2 { 4095 } else { u32::MAX };
    let scene = shared.scene.lock();

    let mut payload = String::new();
    let mut step = range.start_step;
    while step <= range.end_step {
        let last = (step + range.group_size - 1).min(range.end_step);
        // Grouped steps report their nearest return
        let distance = (step..=last)
            .filter_map(|s| scene.get(s as usize).copied())
            .min()
            .unwrap_or(0)
            .min(max_value);
        payload.push_str(&encode_6bit(distance, block));
        if code.has_strength() {
            payload.push_str(&encode_6bit(SIMULATED_STRENGTH, block));
        }
        step += range.group_size;
    }
    drop(scene);

    let mut reply = format!(
        "{}\n{}\n{}\n",
        echo,
        with_checksum(status),
        with_checksum(&encode_6bit(sensor_time(shared), 4))
    );
    for line in encode_data_lines(&payload) {
        reply.push_str(&line);
        reply.push('\n');
    }
    reply.push('\n');
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scip::{Reply, ReplyAssembler, parse_reply};

    fn small_sensor() -> ParameterInfo {
        ParameterInfo {
            model: "SIM".to_string(),
            min_distance: 20,
            max_distance: 5000,
            area_total: 1440,
            min_step: 0,
            max_step: 100,
            front_step: 50,
            scan_rpm: 2400,
        }
    }

    fn exchange(stream: &mut TcpStream, request: &str) -> Vec<String> {
        stream.write_all(request.as_bytes()).unwrap();
        let mut assembler = ReplyAssembler::new();
        let mut buffer = [0u8; 1024];
        loop {
            let n = stream.read(&mut buffer).unwrap();
            assert!(n > 0, "simulator closed the link");
            if let Some(reply) = assembler.push(&buffer[..n]).into_iter().next() {
                return reply;
            }
        }
    }

    #[test]
    fn test_parameters_and_one_shot_scan() {
        let sensor = SimulatedSensor::start(small_sensor()).unwrap();
        sensor.place_object(10, 12, 800);

        let mut stream = TcpStream::connect(sensor.address()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let reply = exchange(&mut stream, "PP\n");
        let Reply::Parameters(info) = parse_reply(&reply, true).unwrap() else {
            panic!("expected parameters");
        };
        assert_eq!(info, small_sensor());

        let reply = exchange(&mut stream, "BM\n");
        assert_eq!(parse_reply(&reply, true).unwrap(), Reply::LaserOn);

        let reply = exchange(&mut stream, "GD0010001401\n");
        let Reply::Scan(frame) = parse_reply(&reply, true).unwrap() else {
            panic!("expected scan");
        };
        assert_eq!(frame.distances, vec![800, 800, 800, 5000, 5000]);
        assert_eq!(sensor.received_commands(), vec!["PP", "BM", "GD0010001401"]);
    }

    #[test]
    fn test_grouped_strength_scan() {
        let sensor = SimulatedSensor::start(small_sensor()).unwrap();
        sensor.place_object(1, 1, 300);
        let mut stream = TcpStream::connect(sensor.address()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        exchange(&mut stream, "BM\n");
        let reply = exchange(&mut stream, "GE0000000302\n");
        let Reply::Scan(frame) = parse_reply(&reply, true).unwrap() else {
            panic!("expected scan");
        };
        assert_eq!(frame.distances, vec![300, 5000]);
        assert_eq!(frame.strengths, vec![SIMULATED_STRENGTH; 2]);
    }

    #[test]
    fn test_bad_range_is_rejected() {
        let sensor = SimulatedSensor::start(small_sensor()).unwrap();
        let mut stream = TcpStream::connect(sensor.address()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        exchange(&mut stream, "BM\n");
        let reply = exchange(&mut stream, "GD0000900001\n");
        assert!(parse_reply(&reply, true).is_err());
    }

    #[test]
    fn test_single_scan_needs_laser() {
        let sensor = SimulatedSensor::start(small_sensor()).unwrap();
        let mut stream = TcpStream::connect(sensor.address()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        for request in ["GD0000001001\n", "GS0000001001\n", "GE0000001001\n"] {
            let reply = exchange(&mut stream, request);
            assert_eq!(reply[1], with_checksum(LASER_OFF_STATUS));
            assert!(parse_reply(&reply, true).is_err());
        }

        exchange(&mut stream, "BM\n");
        let reply = exchange(&mut stream, "GD0000001001\n");
        assert!(matches!(parse_reply(&reply, true), Ok(Reply::Scan(_))));

        exchange(&mut stream, "QT\n");
        let reply = exchange(&mut stream, "GD0000001001\n");
        assert_eq!(reply[1], with_checksum(LASER_OFF_STATUS));
    }
}
