//! Handles shared between tasks and interrupt handlers

use core::cell::RefCell;

use buswire_drivers::{Cancellable, Deadline};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant};

/// Engine handle reachable from thread mode and its ISR
///
/// Empty until [`install`](Self::install); ISRs firing before that do
/// nothing.
pub struct Shared<T> {
    cell: Mutex<CriticalSectionRawMutex, RefCell<Option<T>>>,
}

impl<T> Shared<T> {
    pub const fn new() -> Self {
        Self {
            cell: Mutex::new(RefCell::new(None)),
        }
    }

    pub fn install(&self, handle: T) {
        self.cell.lock(|cell| {
            cell.replace(Some(handle));
        });
    }

    /// Run `f` on the handle inside a critical section
    ///
    /// Must not be nested.
    pub fn with<U>(&self, f: impl FnOnce(&mut T) -> U) -> Option<U> {
        self.cell.lock(|cell| cell.borrow_mut().as_mut().map(f))
    }
}

impl<T: Cancellable> Cancellable for &Shared<T> {
    fn is_idle(&self) -> bool {
        self.cell
            .lock(|cell| cell.borrow().as_ref().map_or(true, |h| h.is_idle()))
    }

    fn cancel(&mut self) {
        self.with(|h| h.cancel());
    }
}

/// Deadline on the embassy time driver
pub struct TimerDeadline {
    at: Instant,
}

impl TimerDeadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
        }
    }
}

impl Deadline for TimerDeadline {
    fn expired(&mut self) -> bool {
        Instant::now() >= self.at
    }
}
