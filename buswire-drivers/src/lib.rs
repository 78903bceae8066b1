//! Communication engines
//!
//! Each engine binds one peripheral instance and its configuration to the
//! live transfer state of a handle:
//!
//! - [`spi::Spi`] - blocking and interrupt-driven SPI, master or slave
//! - [`i2c::I2c`] - I2C master with the start/address/data/stop protocol
//! - [`uart::Uart`] - blocking and interrupt-driven USART/UART
//! - [`deadline`] - bounded waiting for an interrupt-driven transfer
//!
//! Engines reach the hardware only through
//! [`RegisterAccess`](buswire_hal::RegisterAccess). Blocking calls spin on
//! status flags with no timeout and must not be called from interrupt
//! context; the `on_*interrupt` methods are meant to be called from the
//! matching interrupt handler.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod deadline;
pub mod i2c;
pub mod spi;
pub mod uart;

pub use deadline::{wait_idle, Cancellable, Deadline, PollBudget, TransferError};
pub use i2c::I2c;
pub use spi::Spi;
pub use uart::Uart;
