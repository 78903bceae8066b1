//! SPI configuration

use buswire_hal::spi::{BaudDivisor, BusMode, DeviceMode, Mode, Phase, Polarity, SlaveSelect, WordSize};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// SPI transfer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpiConfig {
    pub device_mode: DeviceMode,
    pub bus_mode: BusMode,
    pub word_size: WordSize,
    pub polarity: Polarity,
    pub phase: Phase,
    /// SCK prescaler applied to the bus clock
    pub baud: BaudDivisor,
    pub slave_select: SlaveSelect,
}

impl SpiConfig {
    /// Full-duplex master, mode 0, 8-bit, hardware NSS, SCK = PCLK / 2
    pub const MASTER: Self = Self {
        device_mode: DeviceMode::Master,
        bus_mode: BusMode::FullDuplex,
        word_size: WordSize::Eight,
        polarity: Polarity::IdleLow,
        phase: Phase::CaptureOnFirstTransition,
        baud: BaudDivisor::Div2,
        slave_select: SlaveSelect::Hardware,
    };

    /// Full-duplex slave, mode 0, 8-bit, software NSS
    pub const SLAVE: Self = Self {
        device_mode: DeviceMode::Slave,
        slave_select: SlaveSelect::Software,
        ..Self::MASTER
    };

    /// Replace polarity and phase with the pair selected by `mode`
    pub fn with_mode(mut self, mode: Mode) -> Self {
        let (polarity, phase) = mode.into();
        self.polarity = polarity;
        self.phase = phase;
        self
    }

    pub fn is_full_duplex(&self) -> bool {
        self.bus_mode == BusMode::FullDuplex
    }

    /// Bytes per data register access
    pub fn unit_bytes(&self) -> usize {
        self.word_size.bytes()
    }
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self::MASTER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_mode() {
        let config = SpiConfig::default().with_mode(Mode::Mode3);
        assert_eq!(config.polarity, Polarity::IdleHigh);
        assert_eq!(config.phase, Phase::CaptureOnSecondTransition);
        assert_eq!(config.device_mode, DeviceMode::Master);
    }

    #[test]
    fn test_slave_preset() {
        assert_eq!(SpiConfig::SLAVE.device_mode, DeviceMode::Slave);
        assert_eq!(SpiConfig::SLAVE.slave_select, SlaveSelect::Software);
        assert!(SpiConfig::SLAVE.is_full_duplex());
    }

    #[test]
    fn test_unit_bytes() {
        let mut config = SpiConfig::MASTER;
        assert_eq!(config.unit_bytes(), 1);
        config.word_size = WordSize::Sixteen;
        assert_eq!(config.unit_bytes(), 2);
    }
}
