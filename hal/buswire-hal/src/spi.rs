//! SPI bus abstractions
//!
//! Configuration vocabulary and the blocking master contract shared by
//! every SPI engine.

/// SPI bus master
///
/// Provides blocking SPI operations for communicating with peripheral
/// devices. Operations return once the last unit has been moved into (or
/// out of) the data register; use [`SpiBus::is_busy`] to wait for the
/// shifter to drain before releasing chip select.
pub trait SpiBus {
    /// Error type for SPI operations
    type Error;

    /// Write data, discarding whatever is clocked in
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Read data from the bus
    fn receive(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Transfer data (simultaneous read/write)
    ///
    /// Writes data from `write` buffer while reading into `read` buffer.
    /// Both buffers must be the same length.
    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error>;

    /// Check whether the peripheral is still shifting a frame
    fn is_busy(&self) -> bool;
}

/// Master or slave operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceMode {
    #[default]
    Master,
    Slave,
}

/// Bus wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusMode {
    /// Separate MOSI and MISO lines, both directions at once
    #[default]
    FullDuplex,
    /// Single bidirectional data line
    HalfDuplex,
    /// Two-line, receive only
    SimplexRxOnly,
}

/// Data frame size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WordSize {
    #[default]
    Eight,
    Sixteen,
}

impl WordSize {
    /// Bytes moved per data register access
    pub const fn bytes(self) -> usize {
        match self {
            WordSize::Eight => 1,
            WordSize::Sixteen => 2,
        }
    }
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    #[default]
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    #[default]
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

/// SCK = bus clock / divisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BaudDivisor {
    #[default]
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
    Div256,
}

impl BaudDivisor {
    /// Divide ratio
    pub const fn ratio(self) -> u32 {
        2 << (self as u32)
    }
}

/// Slave-select (NSS) management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlaveSelect {
    /// NSS pin driven/sensed by hardware
    #[default]
    Hardware,
    /// NSS handled in software; the internal level is forced inactive
    Software,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_divisor_ratio() {
        assert_eq!(BaudDivisor::Div2.ratio(), 2);
        assert_eq!(BaudDivisor::Div8.ratio(), 8);
        assert_eq!(BaudDivisor::Div256.ratio(), 256);
    }

    #[test]
    fn test_mode_split() {
        let (pol, pha): (Polarity, Phase) = Mode::Mode3.into();
        assert_eq!(pol, Polarity::IdleHigh);
        assert_eq!(pha, Phase::CaptureOnSecondTransition);
    }
}
