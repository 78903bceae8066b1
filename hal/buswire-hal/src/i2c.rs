//! I2C bus abstractions
//!
//! Provides the master contract and the speed vocabulary used by the I2C
//! engine.

/// I2C bus master
///
/// Provides basic I2C read/write operations for communicating with
/// peripheral devices.
pub trait I2cBus {
    /// Error type for I2C operations
    type Error;

    /// Write data to a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `data` - Bytes to write
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data from a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `buf` - Buffer to read into
    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read in a single transaction (repeated start)
    ///
    /// This is commonly used to write a register address then read data.
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `write_data` - Bytes to write (typically register address)
    /// * `read_buf` - Buffer to read into
    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error>;
}

/// SCL speed class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum I2cSpeed {
    /// 100 kHz
    #[default]
    Standard,
    /// 400 kHz
    Fast,
}

impl I2cSpeed {
    /// SCL frequency in Hz
    pub const fn frequency(self) -> u32 {
        match self {
            I2cSpeed::Standard => 100_000,
            I2cSpeed::Fast => 400_000,
        }
    }

    /// Maximum SCL rise time in nanoseconds allowed for the speed class (I2C-bus standard)
    pub const fn max_rise_time_ns(self) -> u32 {
        match self {
            I2cSpeed::Standard => 1000,
            I2cSpeed::Fast => 300,
        }
    }
}

/// Fast-mode SCL low/high ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FastDuty {
    /// t_low / t_high = 2
    #[default]
    Two,
    /// t_low / t_high = 16/9
    SixteenNine,
}

/// What to do with the bus after a master transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stop {
    /// Issue a STOP condition and release the bus
    #[default]
    Generate,
    /// Keep the bus; the next START is a repeated start
    Hold,
}
