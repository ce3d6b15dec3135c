// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Caller frame buffers and completion records.

use crate::descriptor::DescriptorHandle;
use std::{fmt, sync::mpsc};
use unix_ts::Timestamp;

/// Identifier of a registered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Physically contiguous memory plane lent by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plane {
    /// Bus address the DMA engine writes to
    pub paddr: u32,
    pub size: usize,
}

impl Plane {
    pub fn new(paddr: u32, size: usize) -> Self {
        Plane { paddr, size }
    }
}

/// Ownership state of a buffer.
///
/// `Queued` and `Active` buffers are leased to the controller; the others
/// belong to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferState {
    /// Registered, not leased
    Idle,
    /// Waiting in the queue
    Queued,
    /// Bound to the armed transfer
    Active,
    /// Filled and handed back
    Done,
    /// Aborted and handed back
    Error,
}

impl BufferState {
    pub fn is_leased(&self) -> bool {
        matches!(self, BufferState::Queued | BufferState::Active)
    }
}

impl fmt::Display for BufferState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BufferState::Idle => write!(f, "idle"),
            BufferState::Queued => write!(f, "queued"),
            BufferState::Active => write!(f, "active"),
            BufferState::Done => write!(f, "done"),
            BufferState::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Buffer {
    pub(crate) plane: Plane,
    pub(crate) descriptor: Option<DescriptorHandle>,
    pub(crate) state: BufferState,
}

impl Buffer {
    pub(crate) fn new(plane: Plane) -> Self {
        Buffer {
            plane,
            descriptor: None,
            state: BufferState::Idle,
        }
    }
}

/// A buffer handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedBuffer {
    pub id: BufferId,
    /// `Done` or `Error`
    pub state: BufferState,
    /// Retirement ordinal, meaningless for aborted buffers
    pub sequence: u32,
    /// Monotonic retirement time in nanoseconds, see [`crate::timestamp`]
    pub timestamp_ns: i64,
    pub bytesused: usize,
}

impl CompletedBuffer {
    pub(crate) fn done(id: BufferId, sequence: u32, bytesused: usize) -> Self {
        CompletedBuffer {
            id,
            state: BufferState::Done,
            sequence,
            timestamp_ns: crate::timestamp(),
            bytesused,
        }
    }

    pub(crate) fn aborted(id: BufferId) -> Self {
        CompletedBuffer {
            id,
            state: BufferState::Error,
            sequence: 0,
            timestamp_ns: crate::timestamp(),
            bytesused: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.state == BufferState::Done
    }

    pub fn timestamp(&self) -> Timestamp {
        let sec = self.timestamp_ns.div_euclid(1_000_000_000);
        let ns = self.timestamp_ns.rem_euclid(1_000_000_000);
        Timestamp::new(sec, ns as u32)
    }
}

/// Receiver of finished and aborted buffers.
///
/// Called with the controller lock held, from the caller thread or the
/// interrupt context; implementations must not call back into the
/// controller.
pub trait BufferSink: Send {
    fn buffer_done(&self, done: CompletedBuffer);
}

impl BufferSink for mpsc::Sender<CompletedBuffer> {
    fn buffer_done(&self, done: CompletedBuffer) {
        if self.send(done).is_err() {
            log::trace!("buffer {} dropped, receiver gone", done.id);
        }
    }
}

impl BufferSink for mpsc::SyncSender<CompletedBuffer> {
    fn buffer_done(&self, done: CompletedBuffer) {
        if let Err(err) = self.try_send(done) {
            log::warn!("buffer {} dropped: {}", done.id, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_id_display() {
        assert_eq!(BufferId(7).to_string(), "#7");
    }

    #[test]
    fn test_leased_states() {
        assert!(BufferState::Queued.is_leased());
        assert!(BufferState::Active.is_leased());
        assert!(!BufferState::Idle.is_leased());
        assert!(!BufferState::Done.is_leased());
        assert!(!BufferState::Error.is_leased());
    }

    #[test]
    fn test_completion_timestamp() {
        let mut done = CompletedBuffer::done(BufferId(1), 4, 100);
        assert!(done.is_ok());
        done.timestamp_ns = 3_500_000_000;
        assert_eq!(done.timestamp().seconds(), 3);

        let aborted = CompletedBuffer::aborted(BufferId(2));
        assert!(!aborted.is_ok());
        assert_eq!(aborted.bytesused, 0);
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = mpsc::channel();
        tx.buffer_done(CompletedBuffer::done(BufferId(3), 0, 10));
        assert_eq!(rx.recv().unwrap().id, BufferId(3));
        drop(rx);
        // receiver gone is not an error
        tx.buffer_done(CompletedBuffer::aborted(BufferId(4)));
    }
}
