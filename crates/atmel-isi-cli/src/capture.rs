// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::error::CliError;
use crate::metrics::MetricsCollector;
use crate::utils::{self, SensorArgs};
use atmel_isi::{
    buffer::{BufferId, Plane},
    device::PixFormat,
};
use clap::Args as ClapArgs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc::RecvTimeoutError, Arc};
use std::thread;
use std::time::Duration;

/// Physical address of the first simulated frame buffer
const PLANE_BASE: u32 = 0x2000_0000;
/// Frame buffers are placed on this alignment
const PLANE_ALIGN: usize = 4096;

#[derive(ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    sensor: SensorArgs,

    /// Output resolution in WxH format
    #[arg(short, long, default_value = "640x480")]
    resolution: String,

    /// Output pixel format FOURCC
    #[arg(short, long, default_value = "YUYV")]
    format: String,

    /// Number of frames to capture (0=unlimited)
    #[arg(short = 'n', long, default_value = "30")]
    frames: u64,

    /// Number of frame buffers to request (0=as many as fit)
    #[arg(short, long, default_value = "4")]
    buffers: u32,

    /// Simulated sensor frame rate
    #[arg(short = 'F', long, default_value = "30")]
    fps: u32,

    /// Print capture metrics on exit
    #[arg(long)]
    metrics: bool,
}

pub fn execute(args: Args, json: bool) -> Result<(), CliError> {
    log::debug!("Capture parameters: {:?}", args);

    let (width, height) = utils::parse_resolution(&args.resolution)?;
    let fourcc = utils::parse_fourcc(&args.format)?;
    if args.fps == 0 {
        return Err(CliError::InvalidArgs("frame rate must be positive".to_string()));
    }

    let term = utils::install_signal_handler()?;

    let controller = utils::open_controller(args.sensor.build()?)?;
    let isi = &controller.isi;

    isi.set_bus_param()?;
    let mut pix = PixFormat::new(width, height, fourcc);
    isi.set_format(&mut pix)?;
    log::info!("Capturing {} on {} path", pix, path_name(isi.current()));

    let (count, size) = isi.queue_setup(args.buffers)?;
    let stride = (size + PLANE_ALIGN - 1) / PLANE_ALIGN * PLANE_ALIGN;
    let mut ids: Vec<BufferId> = Vec::with_capacity(count as usize);
    for n in 0..count as usize {
        let paddr = u32::try_from(n * stride)
            .ok()
            .and_then(|offset| PLANE_BASE.checked_add(offset))
            .ok_or_else(|| CliError::Resources("frame buffers exceed address space".to_string()))?;
        let id = isi.register_buffer(Plane::new(paddr, size))?;
        isi.queue_buffer(id)?;
        ids.push(id);
    }
    log::debug!("Queued {} buffers of {} bytes", count, size);

    isi.start_streaming(count)?;

    // simulated sensor: one frame boundary per period
    let running = Arc::new(AtomicBool::new(true));
    let producer = {
        let hw = controller.hw.clone();
        let running = running.clone();
        let period = Duration::from_secs(1) / args.fps;
        thread::Builder::new()
            .name("isi-sensor".to_owned())
            .spawn(move || {
                let mut frames = 0u64;
                while running.load(Ordering::Relaxed) {
                    thread::sleep(period);
                    if hw.frame() {
                        frames += 1;
                    } else {
                        log::trace!("frame dropped, no transfer armed");
                    }
                }
                frames
            })
            .map_err(|e| CliError::General(format!("Failed to spawn sensor thread: {}", e)))?
    };

    let mut metrics = MetricsCollector::new();
    let max_frames = if args.frames == 0 {
        u64::MAX
    } else {
        args.frames
    };
    let timeout = Duration::from_secs(1).max(Duration::from_secs(4) / args.fps);

    let mut captured = 0u64;
    let mut result = Ok(());
    while captured < max_frames && !term.load(Ordering::Relaxed) {
        let done = match controller.done.recv_timeout(timeout) {
            Ok(done) => done,
            Err(RecvTimeoutError::Timeout) => {
                result = Err(CliError::Timeout("no frame completed".to_string()));
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if !done.is_ok() {
            metrics.record_aborted();
            continue;
        }

        metrics.record_latency_ns(atmel_isi::timestamp() - done.timestamp_ns);
        metrics.record_bytes(done.bytesused as u64);
        let gaps = metrics.track_sequence(done.sequence);
        if gaps > 0 {
            log::warn!("{} frames missing before sequence {}", gaps, done.sequence);
        }
        log::trace!(
            "buffer {} sequence {} at {}",
            done.id,
            done.sequence,
            done.timestamp()
        );
        captured += 1;

        if let Err(err) = isi.queue_buffer(done.id) {
            result = Err(err.into());
            break;
        }

        if captured % 30 == 0 {
            log::debug!("Captured {} frames", captured);
        }
    }

    if term.load(Ordering::Relaxed) {
        log::info!("Received Ctrl+C, stopping...");
    }

    running.store(false, Ordering::Relaxed);
    let produced = producer
        .join()
        .map_err(|_| CliError::General("sensor thread panicked".to_string()))?;

    let stopped = isi.stop_streaming();
    for done in controller.done.try_iter() {
        if !done.is_ok() {
            metrics.record_aborted();
        }
    }
    for id in ids {
        isi.unregister_buffer(id)?;
    }
    result?;
    stopped?;

    log::info!(
        "Captured {} frames ({} frame boundaries)",
        captured,
        produced
    );

    if json {
        metrics
            .print_json()
            .map_err(|e| CliError::General(format!("Failed to output JSON metrics: {}", e)))?;
    } else if args.metrics {
        metrics.print_text();
    }

    Ok(())
}

fn path_name(current: Option<atmel_isi::device::InterfaceConfig>) -> String {
    current
        .map(|c| c.path().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
