// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! One-shot hardware acknowledgement.
//!
//! Each wait arms a fresh generation; a signal only satisfies the
//! generation that was armed when it arrived, so a late acknowledgement
//! from an earlier timed-out handshake cannot complete a later one.

use std::{
    sync::{Condvar, Mutex, PoisonError},
    time::Duration,
};

/// Ticket for one armed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    armed: bool,
    done: bool,
}

#[derive(Debug, Default)]
pub struct Completion {
    slot: Mutex<Slot>,
    cond: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a new one-shot, discarding any earlier signal.
    pub fn arm(&self) -> Ticket {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation = slot.generation.wrapping_add(1);
        slot.armed = true;
        slot.done = false;
        Ticket(slot.generation)
    }

    /// Signals the armed one-shot. Signals with nothing armed are dropped.
    pub fn complete(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.armed {
            slot.armed = false;
            slot.done = true;
            self.cond.notify_all();
        } else {
            log::trace!("acknowledgement with no waiter");
        }
    }

    /// Blocks until the one-shot for `ticket` is signalled or `timeout`
    /// elapses. Returns true when signalled.
    pub fn wait_timeout(&self, ticket: Ticket, timeout: Duration) -> bool {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut slot, _) = self
            .cond
            .wait_timeout_while(slot, timeout, |slot| {
                slot.generation == ticket.0 && !slot.done
            })
            .unwrap_or_else(PoisonError::into_inner);
        let signalled = slot.generation == ticket.0 && slot.done;
        if slot.generation == ticket.0 {
            slot.armed = false;
        }
        signalled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread, time::Instant};

    #[test]
    fn test_signal_before_wait() {
        let completion = Completion::new();
        let ticket = completion.arm();
        completion.complete();
        assert!(completion.wait_timeout(ticket, Duration::from_millis(10)));
    }

    #[test]
    fn test_signal_from_thread() {
        let completion = Arc::new(Completion::new());
        let ticket = completion.arm();
        let signaller = completion.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            signaller.complete();
        });
        assert!(completion.wait_timeout(ticket, Duration::from_secs(1)));
        handle.join().unwrap();
    }

    #[test]
    fn test_timeout() {
        let completion = Completion::new();
        let ticket = completion.arm();
        let start = Instant::now();
        assert!(!completion.wait_timeout(ticket, Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_stale_signal_ignored() {
        let completion = Completion::new();
        let first = completion.arm();
        assert!(!completion.wait_timeout(first, Duration::from_millis(1)));
        // late ack for the first wait lands with nothing armed
        completion.complete();
        let second = completion.arm();
        assert!(!completion.wait_timeout(second, Duration::from_millis(5)));
    }
}
