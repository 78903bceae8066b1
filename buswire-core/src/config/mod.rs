//! Transfer configurations
//!
//! One configuration value per engine, set once at init. Changing a field
//! takes effect only on the next `init`.

pub mod i2c;
pub mod spi;
pub mod uart;

pub use i2c::*;
pub use spi::*;
pub use uart::*;
