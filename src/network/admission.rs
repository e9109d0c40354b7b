//! Admission Controller
//!
//! Fixed-size permit pool that bounds concurrently served sessions.
//!
//! Waiters are admitted in arrival order. A permit is a guard: dropping it
//! returns the slot, on every exit path including unwinding.

use parking_lot::{Condvar, Mutex};

struct PoolState {
    available: usize,
    closed: bool,

    /// Ticket handed to the next caller of `acquire`
    next_ticket: u64,

    /// Ticket allowed to take the next free permit
    now_serving: u64,
}

/// Counting permit pool
pub struct PermitPool {
    capacity: usize,
    state: Mutex<PoolState>,
    changed: Condvar,
}

impl PermitPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(PoolState {
                available: capacity,
                closed: false,
                next_ticket: 0,
                now_serving: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Block until a permit is free
    ///
    /// Returns `None` if the pool is closed before this caller is admitted.
    pub fn acquire(&self) -> Option<Permit<'_>> {
        let mut state = self.state.lock();

        let ticket = state.next_ticket;
        state.next_ticket += 1;

        while !state.closed && !(ticket == state.now_serving && state.available > 0) {
            self.changed.wait(&mut state);
        }

        if state.closed {
            return None;
        }

        state.available -= 1;
        state.now_serving += 1;
        drop(state);

        // The next ticket may be admissible too
        self.changed.notify_all();

        Some(Permit { pool: self })
    }

    /// Refuse all current and future waiters
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.state.lock().available
    }

    /// Permits currently held
    pub fn in_use(&self) -> usize {
        self.capacity - self.available()
    }

    fn release(&self) {
        self.state.lock().available += 1;
        self.changed.notify_all();
    }
}

/// A held admission slot; released on drop
pub struct Permit<'a> {
    pool: &'a PermitPool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.pool.release();
    }
}
