//! Chip-level core for the buswire communication drivers
//!
//! This crate holds everything the engines need that is not itself an
//! engine:
//!
//! - STM32F407 register maps and peripheral instances
//! - Clock authority (system and bus clock derivation)
//! - Transfer state, cursors and events
//! - Per-protocol transfer configurations
//! - Behavioural peripheral models for host tests (`mock` feature)

#![no_std]
#![deny(unsafe_code)]

#[cfg(any(test, feature = "mock"))]
extern crate std;

pub mod clock;
pub mod config;
pub mod event;
pub mod instance;
pub mod regs;
#[cfg(any(test, feature = "mock"))]
pub mod sim;
pub mod transfer;

pub use clock::{bus_clock, system_clock, Bus, ClockGate, ClockTree, ResetLine};
pub use event::{Event, EventHandler, NoEvents};
pub use instance::{I2cInstance, SpiInstance, UartInstance};
pub use transfer::{RxCursor, TransferState, TxCursor};
