//! STM32F407 bindings for the buswire HAL
//!
//! This crate is the only place where the buswire stack touches real
//! silicon:
//!
//! - [`Mmio`] - volatile [`RegisterAccess`](buswire_hal::RegisterAccess) on absolute addresses
//! - [`Nvic`] - [`InterruptController`](buswire_hal::InterruptController) over the Cortex-M NVIC
//! - [`GpioMux`] - [`PinMux`](buswire_hal::PinMux) over the GPIO port registers

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod gpio;
pub mod mmio;
pub mod nvic;

pub use gpio::GpioMux;
pub use mmio::Mmio;
pub use nvic::Nvic;
