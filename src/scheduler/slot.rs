//! Mutation slot
//!
//! A ticket lock serializing every index mutation, whether it runs on the
//! background worker or on a caller's thread. Tickets are served strictly in
//! the order they were taken.
//!
//! # Invariants
//!
//! - At most one [`SlotGuard`] exists at a time
//! - A ticket dropped without being acquired is skipped, never waited on

use std::collections::BTreeSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct SlotState {
    /// Next ticket number to hand out
    next_ticket: u64,
    /// Ticket allowed to run
    serving: u64,
    /// Tickets given up before their turn
    abandoned: BTreeSet<u64>,
}

impl SlotState {
    fn advance(&mut self) {
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
    }
}

/// Ticket lock shared by the worker and synchronous callers
#[derive(Debug, Default)]
pub struct MutationSlot {
    state: Mutex<SlotState>,
    turn: Condvar,
}

impl MutationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the next place in line
    pub fn take_ticket(self: &Arc<Self>) -> Ticket {
        let mut state = self.lock();
        let number = state.next_ticket;
        state.next_ticket += 1;
        Ticket {
            slot: Arc::clone(self),
            number,
            acquired: false,
        }
    }

    /// Tickets taken but not yet finished or abandoned
    pub fn outstanding(&self) -> u64 {
        let state = self.lock();
        state.next_ticket - state.serving - state.abandoned.len() as u64
    }

    /// Block until every ticket taken so far has finished or been abandoned
    pub fn wait_idle(&self) {
        let mut state = self.lock();
        while state.serving != state.next_ticket {
            state = self
                .turn
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn release(&self) {
        let mut state = self.lock();
        state.advance();
        self.turn.notify_all();
    }

    fn abandon(&self, number: u64) {
        let mut state = self.lock();
        if state.serving == number {
            state.advance();
        } else {
            state.abandoned.insert(number);
        }
        self.turn.notify_all();
    }
}

/// A place in line for the mutation slot
#[derive(Debug)]
pub struct Ticket {
    slot: Arc<MutationSlot>,
    number: u64,
    acquired: bool,
}

impl Ticket {
    /// Ticket number, in submission order
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Block until this ticket is served and hold the slot
    pub fn acquire(mut self) -> SlotGuard {
        let slot = Arc::clone(&self.slot);
        let mut state = slot.lock();
        while state.serving != self.number {
            state = slot.turn.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        drop(state);
        self.acquired = true;
        SlotGuard { slot }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.acquired {
            self.slot.abandon(self.number);
        }
    }
}

/// Exclusive hold on the mutation slot; released on drop
#[derive(Debug)]
pub struct SlotGuard {
    slot: Arc<MutationSlot>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slot.release();
    }
}
