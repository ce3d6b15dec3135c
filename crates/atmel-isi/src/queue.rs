// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Buffer queue and streaming state machine
//!
//! [`BufferQueue`] holds the FIFO of queued buffers, the single active
//! buffer and the sequence counter. It never touches hardware: every
//! transition returns the buffer the caller must arm, retire or abort, and
//! the controller performs the register writes while still holding the
//! lock that guards the queue.
//!
//! ```text
//!            enqueue/start            complete (queue empty)
//!   Idle ───────────────────▶ Armed ─────────────────────────▶ Idle
//!    ▲                          │ ▲
//!    │                 complete │ │ (next queued buffer)
//!    │                          ▼ │
//!    │       finish_stop       stop
//!    └──────────────────── Draining ◀──── (from any state)
//! ```

use crate::buffer::BufferId;
use std::{collections::VecDeque, fmt};

/// Observable streaming state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// No active buffer
    Idle,
    /// Active buffer set and its transfer armed
    Armed,
    /// Stop requested, waiting for the in-flight transfer
    Draining,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StreamState::Idle => write!(f, "idle"),
            StreamState::Armed => write!(f, "armed"),
            StreamState::Draining => write!(f, "draining"),
        }
    }
}

/// Outcome of a completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retired {
    pub id: BufferId,
    pub sequence: u32,
    /// Buffer promoted to active, to be armed
    pub next: Option<BufferId>,
}

/// Buffers released by [`BufferQueue::stop`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stopped {
    /// Buffer the hardware may still be writing
    pub in_flight: Option<BufferId>,
    /// Queued buffers, in queue order
    pub aborted: Vec<BufferId>,
}

/// FIFO of queued buffers plus the active buffer.
#[derive(Debug, Default)]
pub struct BufferQueue {
    queued: VecDeque<BufferId>,
    active: Option<BufferId>,
    streaming: bool,
    draining: bool,
    sequence: u32,
}

impl BufferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> StreamState {
        if self.draining {
            StreamState::Draining
        } else if self.active.is_some() {
            StreamState::Armed
        } else {
            StreamState::Idle
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn active(&self) -> Option<BufferId> {
        self.active
    }

    pub fn queued(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.queued.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Sequence number the next retired buffer receives.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Clears the active buffer and restarts sequence numbering.
    pub fn reset(&mut self) {
        self.active = None;
        self.sequence = 0;
    }

    /// Appends a buffer; returns it when it must be armed right away.
    pub fn enqueue(&mut self, id: BufferId) -> Option<BufferId> {
        self.queued.push_back(id);
        if self.streaming && !self.draining && self.active.is_none() {
            return self.promote();
        }
        None
    }

    /// Enables streaming; returns the buffer to arm when `count > 0` and a
    /// buffer is waiting.
    pub fn start(&mut self, count: u32) -> Option<BufferId> {
        self.streaming = true;
        self.draining = false;
        if count > 0 && self.active.is_none() {
            return self.promote();
        }
        None
    }

    /// Puts a buffer that could not be armed back at the head.
    pub fn unarm(&mut self, id: BufferId) {
        if self.active == Some(id) {
            self.active = None;
            self.queued.push_front(id);
        }
    }

    /// Retires the active buffer and promotes the next one while
    /// streaming. Returns `None` when no buffer was active.
    pub fn complete(&mut self) -> Option<Retired> {
        let id = self.active.take()?;
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        let next = if self.streaming && !self.draining {
            self.promote()
        } else {
            None
        };
        Some(Retired { id, sequence, next })
    }

    /// Enters Draining; the active buffer is abandoned and every queued
    /// buffer is released for abort.
    pub fn stop(&mut self) -> Stopped {
        self.streaming = false;
        self.draining = true;
        Stopped {
            in_flight: self.active.take(),
            aborted: self.queued.drain(..).collect(),
        }
    }

    /// Leaves Draining once the hardware is disabled.
    pub fn finish_stop(&mut self) {
        self.draining = false;
    }

    fn promote(&mut self) -> Option<BufferId> {
        self.active = self.queued.pop_front();
        self.active
    }
}
