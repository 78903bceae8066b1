//! buswire Hardware Abstraction Layer
//!
//! This crate defines the seams between the buswire communication engines
//! and the silicon they drive. Engines never touch memory-mapped registers
//! directly; they go through [`RegisterAccess`], which is bound to real
//! addresses by a chip crate and to an in-memory register file in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (buswire-firmware, etc.)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  buswire-drivers (SPI / I2C / UART)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  buswire-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ buswire-hal-  │       │ mock register │
//! │   stm32f4     │       │     file      │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`register::RegisterAccess`] - Named field read/write over absolute addresses
//! - [`interrupt::InterruptController`] - Interrupt line enable/priority
//! - [`gpio::PinMux`] - Alternate-function pin configuration
//! - [`spi::SpiBus`], [`i2c::I2cBus`], [`uart::UartTx`], [`uart::UartRx`] - Blocking bus operations

#![no_std]
#![deny(unsafe_code)]

#[cfg(any(test, feature = "mock"))]
extern crate std;

pub mod gpio;
pub mod i2c;
pub mod interrupt;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod register;
pub mod spi;
pub mod uart;

// Re-export key traits at crate root for convenience
pub use gpio::PinMux;
pub use i2c::I2cBus;
pub use interrupt::{InterruptController, Irq};
pub use register::{Field, RegisterAccess};
pub use spi::SpiBus;
pub use uart::{UartRx, UartTx};
