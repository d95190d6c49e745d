//! urg-tracker daemon
//!
//! One consumer thread per configured sensor, each ticking its
//! [`SensorPipeline`] at `tick_interval_ms`. Events go to the log and,
//! when enabled, to the UDP stream.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;
use urg_tracker::streaming::UdpEventPublisher;
use urg_tracker::{
    LoggingListener, Result, SensorConfig, SensorPipeline, TrackerConfig, TrackerError,
};

#[derive(Parser)]
#[command(name = "urg-tracker")]
#[command(about = "Track objects in front of Hokuyo/URG laser range finders")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "urg-tracker.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = TrackerConfig::load(&args.config)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("urg-tracker v{} starting", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", args.config.display());

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| TrackerError::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let publisher = if config.streaming.enabled {
        Some(UdpEventPublisher::from_config(&config.streaming)?)
    } else {
        None
    };

    let mut handles = Vec::with_capacity(config.sensors.len());
    for sensor in config.sensors {
        let running = Arc::clone(&running);
        let publisher = publisher.clone();
        let name = sensor.name.clone();
        let handle = thread::Builder::new()
            .name(format!("sensor-{}", name))
            .spawn(move || run_sensor(sensor, publisher, running))?;
        log::info!("Started sensor thread '{}'", name);
        handles.push(handle);
    }

    for handle in handles {
        if handle.join().is_err() {
            log::error!("Sensor thread panicked");
        }
    }

    log::info!("urg-tracker stopped");
    Ok(())
}

fn run_sensor(config: SensorConfig, publisher: Option<UdpEventPublisher>, running: Arc<AtomicBool>) {
    let mut pipeline = SensorPipeline::new(&config, Instant::now());
    pipeline.add_listener(Box::new(LoggingListener));
    if let Some(publisher) = publisher {
        pipeline.add_listener(Box::new(publisher));
    }
    pipeline.start();

    let interval = config.tick_interval();
    while running.load(Ordering::Relaxed) {
        let started = Instant::now();
        pipeline.tick(started);
        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    pipeline.stop();
}
