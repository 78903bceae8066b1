//! Mock register file for testing
//!
//! [`MockRegisters`] implements [`RegisterAccess`] on host builds. Plain
//! addresses behave like memory; address windows can be handed to a
//! [`MockPeripheral`] model that emulates status-flag side effects. Every
//! access is recorded in order so tests can assert on exact register
//! traffic.
//!
//! # Feature Gate
//!
//! This module is available in two contexts:
//! - During test builds (`#[cfg(test)]`)
//! - When the `mock` feature is enabled
//!
//! # Example
//!
//! ```rust,ignore
//! use buswire_hal::mock::{Access, MockRegisters};
//! use buswire_hal::RegisterAccess;
//!
//! let regs = MockRegisters::new();
//! regs.write(0x4000_0000, 0x1);
//! assert_eq!(regs.read(0x4000_0000), 0x1);
//! assert_eq!(regs.log()[0], Access::Write { addr: 0x4000_0000, value: 0x1 });
//! ```

use core::cell::RefCell;
use std::boxed::Box;
use std::collections::BTreeMap;
use std::vec::Vec;

use crate::register::RegisterAccess;

/// One recorded register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read { addr: u32, value: u32 },
    Write { addr: u32, value: u32 },
}

impl Access {
    /// Address touched by this access
    pub fn addr(&self) -> u32 {
        match *self {
            Access::Read { addr, .. } | Access::Write { addr, .. } => addr,
        }
    }

    /// Value read or written
    pub fn value(&self) -> u32 {
        match *self {
            Access::Read { value, .. } | Access::Write { value, .. } => value,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Access::Read { .. })
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Access::Write { .. })
    }
}

/// Behavioural model of one peripheral's register block
///
/// Offsets are relative to the base address the model was attached at.
pub trait MockPeripheral {
    /// Read a register; may update internal state (read-to-clear flags)
    fn read(&mut self, offset: u32) -> u32;

    /// Write a register
    fn write(&mut self, offset: u32, value: u32);
}

struct Window {
    base: u32,
    len: u32,
    model: Box<dyn MockPeripheral>,
}

impl Window {
    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr - self.base < self.len
    }
}

/// In-memory register file with an ordered access log
#[derive(Default)]
pub struct MockRegisters {
    memory: RefCell<BTreeMap<u32, u32>>,
    windows: RefCell<Vec<Window>>,
    log: RefCell<Vec<Access>>,
}

impl MockRegisters {
    /// Create an empty register file (every address reads 0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `len` bytes starting at `base` to `model`
    pub fn attach<M>(&mut self, base: u32, len: u32, model: M)
    where
        M: MockPeripheral + 'static,
    {
        self.windows.get_mut().push(Window {
            base,
            len,
            model: Box::new(model),
        });
    }

    /// Preset a plain memory location without recording an access
    pub fn set(&self, addr: u32, value: u32) {
        self.memory.borrow_mut().insert(addr, value);
    }

    /// Current value of a plain memory location, without recording an access
    pub fn peek(&self, addr: u32) -> u32 {
        self.memory.borrow().get(&addr).copied().unwrap_or(0)
    }

    /// Every access since creation or the last [`clear_log`](Self::clear_log)
    pub fn log(&self) -> Vec<Access> {
        self.log.borrow().clone()
    }

    /// Forget recorded accesses
    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    /// Values written to `addr`, in order
    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.log
            .borrow()
            .iter()
            .filter(|a| a.is_write() && a.addr() == addr)
            .map(Access::value)
            .collect()
    }

    /// Number of reads of `addr`
    pub fn reads_of(&self, addr: u32) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|a| a.is_read() && a.addr() == addr)
            .count()
    }
}

impl RegisterAccess for MockRegisters {
    fn read(&self, addr: u32) -> u32 {
        let modelled = self
            .windows
            .borrow_mut()
            .iter_mut()
            .find(|w| w.contains(addr))
            .map(|w| w.model.read(addr - w.base));
        let value = modelled.unwrap_or_else(|| self.peek(addr));
        self.log.borrow_mut().push(Access::Read { addr, value });
        value
    }

    fn write(&self, addr: u32, value: u32) {
        self.log.borrow_mut().push(Access::Write { addr, value });
        let mut windows = self.windows.borrow_mut();
        match windows.iter_mut().find(|w| w.contains(addr)) {
            Some(w) => w.model.write(addr - w.base, value),
            None => {
                self.memory.borrow_mut().insert(addr, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;

    /// Counter that increments on every read of offset 0
    struct Counter(u32);

    impl MockPeripheral for Counter {
        fn read(&mut self, offset: u32) -> u32 {
            if offset == 0 {
                self.0 += 1;
            }
            self.0
        }

        fn write(&mut self, _offset: u32, value: u32) {
            self.0 = value;
        }
    }

    #[test]
    fn test_plain_memory() {
        let regs = MockRegisters::new();
        assert_eq!(regs.read(0x10), 0);
        regs.write(0x10, 0xAB);
        assert_eq!(regs.read(0x10), 0xAB);
        assert_eq!(regs.writes_to(0x10), vec![0xAB]);
        assert_eq!(regs.reads_of(0x10), 2);
    }

    #[test]
    fn test_set_is_not_logged() {
        let regs = MockRegisters::new();
        regs.set(0x20, 7);
        assert!(regs.log().is_empty());
        assert_eq!(regs.peek(0x20), 7);
    }

    #[test]
    fn test_modify_helpers() {
        let regs = MockRegisters::new();
        regs.set(0x0, 0b1000);
        regs.set_bits(0x0, 0b0001);
        regs.clear_bits(0x0, 0b1000);
        assert_eq!(regs.peek(0x0), 0b0001);
        regs.write_field(0x0, crate::Field::new(4, 4), 0xF);
        assert_eq!(regs.peek(0x0), 0xF1);
    }

    #[test]
    fn test_window_routes_to_model() {
        let mut regs = MockRegisters::new();
        regs.attach(0x1000, 0x100, Counter(0));

        assert_eq!(regs.read(0x1000), 1);
        assert_eq!(regs.read(0x1000), 2);
        regs.write(0x1004, 10);
        assert_eq!(regs.read(0x1000), 11);
        // Outside the window is plain memory
        assert_eq!(regs.read(0x1100), 0);
        assert_eq!(regs.peek(0x1004), 0);
    }

    #[test]
    fn test_log_order() {
        let regs = MockRegisters::new();
        regs.write(0x4, 1);
        regs.read(0x8);
        regs.clear_log();
        regs.read(0x4);
        assert_eq!(regs.log(), vec![Access::Read { addr: 0x4, value: 1 }]);
    }
}
