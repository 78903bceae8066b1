//! I2C configuration

use buswire_hal::i2c::{FastDuty, I2cSpeed};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// I2C master configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct I2cConfig {
    /// 7-bit address this controller answers to as a slave
    pub own_address: u8,
    /// Acknowledge received bytes
    pub ack: bool,
    pub speed: I2cSpeed,
    /// Ignored in standard mode
    pub duty: FastDuty,
}

impl I2cConfig {
    /// 100 kHz, ACK on
    pub const STANDARD: Self = Self {
        own_address: 0x61,
        ack: true,
        speed: I2cSpeed::Standard,
        duty: FastDuty::Two,
    };

    /// 400 kHz with a 2:1 duty cycle, ACK on
    pub const FAST: Self = Self {
        speed: I2cSpeed::Fast,
        ..Self::STANDARD
    };

    pub fn with_own_address(mut self, address: u8) -> Self {
        self.own_address = address & 0x7F;
        self
    }
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(I2cConfig::default().speed, I2cSpeed::Standard);
        assert_eq!(I2cConfig::FAST.speed, I2cSpeed::Fast);
        assert!(I2cConfig::FAST.ack);
    }

    #[test]
    fn test_own_address_is_seven_bits() {
        let config = I2cConfig::default().with_own_address(0xFF);
        assert_eq!(config.own_address, 0x7F);
    }
}
