// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Atmel ISI Capture Core for Rust
//!
//! Capture pipeline for the Atmel Image Sensor Interface (ISI): the
//! interrupt-driven DMA descriptor ring that moves frames from a parallel
//! camera sensor into caller-supplied, physically contiguous frame buffers.
//!
//! The crate owns three things exclusively: the controller registers, the
//! DMA-coherent descriptor table and the streaming state shared between
//! caller threads and the interrupt context. Everything else (the sensor,
//! the buffer allocator, the consumer of finished frames) is reached through
//! small collaborator traits.
//!
//! # Quick Start
//!
//! ```no_run
//! use atmel_isi::{
//!     device::{Isi, IsiConfig, PixFormat},
//!     fourcc::FourCC,
//!     sim::{SimSensor, SimulatedIsi},
//!     buffer::Plane,
//! };
//! use std::sync::{mpsc, Arc};
//!
//! let config = IsiConfig::default();
//! let table = config.descriptor_table();
//! let hw = Arc::new(SimulatedIsi::new(table.clone()));
//! let (tx, rx) = mpsc::channel();
//! let isi = Arc::new(Isi::new(hw.clone(), table, config, tx)?);
//! hw.connect(&isi);
//!
//! isi.attach(Box::new(SimSensor::default()))?;
//! let mut pix = PixFormat::new(640, 480, FourCC::YUYV);
//! isi.set_format(&mut pix)?;
//!
//! let (count, size) = isi.queue_setup(4)?;
//! for n in 0..count {
//!     let id = isi.register_buffer(Plane::new(0x2000_0000 + n * size as u32, size))?;
//!     isi.queue_buffer(id)?;
//! }
//! isi.start_streaming(count)?;
//! hw.frame();
//! let done = rx.recv()?;
//! println!("buffer {} sequence {}", done.id, done.sequence);
//! isi.stop_streaming()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Features
//!
//! - Fixed 32-entry DMA descriptor pool with sticky buffer binding
//! - FIFO buffer queue with a single active (armed) transfer
//! - Preview (scaled RGB565) and codec (passthrough) datapaths
//! - Reset/disable handshakes with bounded waits
//! - In-process controller model for tests and tooling

use std::{error, fmt, sync::OnceLock, time::Instant};

/// The regs module provides the register map and the register access seam.
pub mod regs;

/// The fourcc module provides portable handling of fourcc codes.
pub mod fourcc;

/// The format module provides media-bus codes and host format translation.
pub mod format;

/// The geometry module computes scaling and byte-order register values.
pub mod geometry;

/// The bus module provides parallel bus parameter negotiation.
pub mod bus;

/// The sensor module defines the sensor-control collaborator.
pub mod sensor;

/// The descriptor module provides the DMA descriptor table and pool.
pub mod descriptor;

/// The buffer module provides caller frame buffers and completion records.
pub mod buffer;

/// The queue module provides the buffer queue and streaming states.
pub mod queue;

/// The completion module provides the one-shot hardware acknowledgement.
pub mod completion;

/// The device module provides the ISI host controller.
pub mod device;

/// The sim module provides an in-process model of the ISI controller.
pub mod sim;

/// Hardware handshake that can time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handshake {
    /// Software reset acknowledgement
    Reset,
    /// Channel disable acknowledgement
    Disable,
    /// Codec request still pending after the frame interval
    CodecDrain,
}

impl fmt::Display for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Handshake::Reset => write!(f, "reset"),
            Handshake::Disable => write!(f, "disable"),
            Handshake::CodecDrain => write!(f, "codec drain"),
        }
    }
}

/// Error type for ISI capture operations
#[derive(Debug)]
pub enum Error {
    /// Unsupported pixel format, media-bus code or geometry combination.
    /// Hardware is left disabled.
    InvalidFormat(String),

    /// Caller buffer plane cannot hold the negotiated frame
    BufferTooSmall { size: usize, required: usize },

    /// Every DMA descriptor is bound to a registered buffer
    NoDescriptors,

    /// Hardware did not acknowledge within its budget
    Timeout(Handshake),

    /// Resource already in use (sensor attached, stream running)
    Busy,

    /// Operation is not valid in the current state
    InvalidState(&'static str),

    /// Buffer id is not registered with this controller
    UnknownBuffer(buffer::BufferId),

    /// Sensor collaborator rejected the request
    Sensor(String),

    /// Malformed argument (fourcc string, resolution)
    InvalidArgument(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidFormat(msg) => write!(f, "unsupported format: {}", msg),
            Error::BufferTooSmall { size, required } => write!(
                f,
                "data will not fit into plane ({} < {})",
                size, required
            ),
            Error::NoDescriptors => write!(f, "not enough dma descriptors"),
            Error::Timeout(handshake) => write!(f, "{} timed out", handshake),
            Error::Busy => write!(f, "device or resource busy"),
            Error::InvalidState(msg) => write!(f, "invalid state: {}", msg),
            Error::UnknownBuffer(id) => write!(f, "unknown buffer {}", id),
            Error::Sensor(msg) => write!(f, "sensor error: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        None
    }
}

impl Error {
    /// Returns true for handshake timeouts.
    ///
    /// The device stays addressable after a timeout, its register state is
    /// whatever the hardware reports.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Get the current monotonic timestamp in nanoseconds
///
/// The clock starts the first time any timestamp is taken in this process
/// and never goes backwards.
pub fn timestamp() -> i64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    i64::try_from(epoch.elapsed().as_nanos()).unwrap_or(i64::MAX)
}
