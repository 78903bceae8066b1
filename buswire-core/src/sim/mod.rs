//! Behavioural peripheral models for host tests
//!
//! Each model plugs into [`MockRegisters`] as a [`MockPeripheral`] and
//! reproduces the status-flag behaviour the engines depend on: data
//! register side effects, read-sequence flag clearing, and interrupt
//! pending conditions. Models are cheap `Clone` handles onto shared state,
//! so a test keeps one copy to inspect while the register file owns the
//! other.
//!
//! Data moves instantly: a unit written to a transmit register is on the
//! wire (and in the peer's receive queue) before the write returns.
//!
//! [`MockRegisters`]: buswire_hal::mock::MockRegisters
//! [`MockPeripheral`]: buswire_hal::mock::MockPeripheral

mod i2c;
mod spi;
mod usart;

pub use i2c::{BusEvent, SimI2c};
pub use spi::SimSpi;
pub use usart::SimUsart;

use core::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

use crate::event::{Event, EventHandler};

/// Register window length of every modelled block
pub const WINDOW: u32 = 0x400;

/// Event sink that records everything it receives
///
/// Clones share one log, so a test can hand one copy to a handle and read
/// the other.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, oldest first
    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl EventHandler for EventLog {
    fn on_event(&mut self, event: Event) {
        self.0.borrow_mut().push(event);
    }
}
