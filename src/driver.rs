//! Top-level wiring: resolves the device, starts the server, hooks the
//! bridge's surface callback through the encoder into the ring, spawns the
//! HID injector and the command reader, then runs the paced reporting loop.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::bridge::DeviceBridge;
use crate::cli::Config;
use crate::command::{self, ButtonName, Command, Direction};
use crate::display::PixelBuffer;
use crate::error::Result;
use crate::hid::HidInjector;
use crate::server::MjpegServer;
use crate::utils::LogThrottler;
use crate::video::encoder::{Encoder, JpegEncoder, JpegEncoderConfig};
use crate::warn_throttled;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);
/// How finely the reporting loop checks the shutdown flag while waiting out
/// a tick; keeps `shutdown` responsive well within the documented 1 s bound
/// without busy-spinning the whole second.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(20);
/// The loop spin-waits rather than sleeps for the last stretch of each tick,
/// trading a little CPU for tighter timing than `thread::sleep` guarantees.
const SPIN_WAIT_WINDOW: Duration = Duration::from_millis(1);
/// A persistent per-frame encode failure would otherwise warn at up to the
/// capture frame rate; throttle it to one line per interval.
const ENCODE_FAILURE_WARN_INTERVAL: Duration = Duration::from_secs(2);

pub fn run(config: Config) -> Result<()> {
    let mut server = MjpegServer::start(config.port, crate::server::DEFAULT_RING_CAPACITY)?;
    println!("stream_ready {}", server.stream_url());
    std::io::stdout().flush().ok();

    let ring = server.ring_handle();
    let sequence = Arc::new(AtomicU64::new(0));
    let frame_count = Arc::new(AtomicU64::new(0));
    let encoded_frames = Arc::new(AtomicU64::new(0));
    let encoder_slot: Arc<Mutex<Option<JpegEncoder>>> = Arc::new(Mutex::new(None));
    let quality = config.quality;
    let encode_failure_throttle = Arc::new(LogThrottler::new(ENCODE_FAILURE_WARN_INTERVAL));

    let ring_cb = ring.clone();
    let sequence_cb = sequence.clone();
    let frame_count_cb = frame_count.clone();
    let encoded_frames_cb = encoded_frames.clone();
    let encoder_slot_cb = encoder_slot.clone();
    let encode_failure_throttle_cb = encode_failure_throttle.clone();

    let mut bridge = DeviceBridge::start(&config.udid, move |surface| {
        frame_count_cb.fetch_add(1, Ordering::Relaxed);

        let resolution = surface.resolution();
        let mut slot = encoder_slot_cb.lock();
        let needs_new = slot
            .as_ref()
            .map(|encoder: &JpegEncoder| encoder.config().resolution != resolution)
            .unwrap_or(true);
        if needs_new {
            tracing::info!(?resolution, "surface geometry changed, rebuilding encoder");
            *slot = Some(JpegEncoder::new(JpegEncoderConfig {
                resolution,
                quality,
            }));
        }
        let encoder = slot.as_mut().expect("just inserted above");

        let pixel_buffer = PixelBuffer::new(&surface);
        let seq = sequence_cb.fetch_add(1, Ordering::Relaxed);
        match encoder.encode(&pixel_buffer, seq) {
            Ok(frame) => {
                encoded_frames_cb.fetch_add(1, Ordering::Relaxed);
                ring_cb.push(frame);
            }
            Err(e) => {
                warn_throttled!(
                    encode_failure_throttle_cb,
                    "frame_encode_failed",
                    error = %e,
                    "frame encode failed, dropping frame"
                );
            }
        }
    })?;

    let injector = Arc::new(HidInjector::start(&config.udid)?);
    let fps_enabled = Arc::new(AtomicBool::new(false));
    let shutdown = Arc::new(AtomicBool::new(false));

    let injector_cmd = injector.clone();
    let fps_enabled_cmd = fps_enabled.clone();
    let shutdown_cmd = shutdown.clone();
    let _reader = command::reader::spawn(move |cmd| dispatch_command(cmd, &injector_cmd, &fps_enabled_cmd, &shutdown_cmd));

    run_reporting_loop(&shutdown, &fps_enabled, &frame_count, &encoded_frames);

    bridge.stop();
    server.stop();
    std::process::exit(0);
}

fn dispatch_command(
    cmd: Command,
    injector: &HidInjector,
    fps_enabled: &AtomicBool,
    shutdown: &AtomicBool,
) {
    match cmd {
        Command::Touch { phase, points } => injector.send_touch(phase, &points),
        Command::Button { name, direction } => dispatch_button(injector, name, direction),
        Command::Key { code, direction } => injector.send_key(code, direction),
        Command::Rotate(value) => {
            tracing::info!(rotation = %value, "rotate command received (no orientation API yet, ignored)");
        }
        Command::Fps(enabled) => {
            tracing::info!(enabled, "fps reporting toggled");
            fps_enabled.store(enabled, Ordering::Relaxed);
        }
        Command::Shutdown => {
            tracing::info!("shutdown command received");
            shutdown.store(true, Ordering::Relaxed);
        }
        Command::Unknown(_) => {}
    }
}

fn dispatch_button(injector: &HidInjector, name: ButtonName, direction: Direction) {
    tracing::info!(?name, ?direction, "button command received");
    injector.send_button(name, direction);
}

fn run_reporting_loop(
    shutdown: &AtomicBool,
    fps_enabled: &AtomicBool,
    frame_count: &AtomicU64,
    encoded_frames: &AtomicU64,
) {
    let start = Instant::now();
    let mut next_tick = start + REPORT_INTERVAL;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now < next_tick {
            let remaining = next_tick - now;
            if remaining > SPIN_WAIT_WINDOW {
                wait_with_shutdown_check(remaining - SPIN_WAIT_WINDOW, shutdown);
                if shutdown.load(Ordering::Relaxed) {
                    return;
                }
            }
            while Instant::now() < next_tick {
                std::hint::spin_loop();
            }
        }
        next_tick += REPORT_INTERVAL;

        if fps_enabled.load(Ordering::Relaxed) {
            emit_fps_report(start, frame_count, encoded_frames);
        }
    }
}

fn wait_with_shutdown_check(duration: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        std::thread::sleep(SHUTDOWN_POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
    }
}

fn emit_fps_report(start: Instant, frame_count: &AtomicU64, encoded_frames: &AtomicU64) {
    let elapsed = start.elapsed().as_secs_f64();
    let frame_count = frame_count.load(Ordering::Relaxed);
    let encoded_frames_value = encoded_frames.load(Ordering::Relaxed);
    let fps = if elapsed > 0.0 {
        frame_count as f64 / elapsed
    } else {
        0.0
    };

    let report = serde_json::json!({
        "frame_count": frame_count,
        "encoded_frames": encoded_frames_value,
        "fps": round_to(fps, 1),
        "elapsed": round_to(elapsed, 2),
    });
    println!("fps_report {report}");
    std::io::stdout().flush().ok();
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_respects_decimal_count() {
        assert_eq!(round_to(29.9999, 1), 30.0);
        assert_eq!(round_to(1.1234, 2), 1.12);
    }
}
