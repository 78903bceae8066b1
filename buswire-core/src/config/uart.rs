//! UART configuration

use buswire_hal::uart::{Direction, FlowControl, Parity, StopBits, WordLength};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// UART frame and line configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UartConfig {
    /// Bits per second
    pub baud: u32,
    pub word_length: WordLength,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    pub direction: Direction,
}

impl UartConfig {
    /// 115200 baud, 8N1, both directions, no flow control
    pub const DEFAULT: Self = Self {
        baud: 115_200,
        word_length: WordLength::Eight,
        stop_bits: StopBits::One,
        parity: Parity::None,
        flow_control: FlowControl::None,
        direction: Direction::TxRx,
    };

    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    /// Bytes per data register access
    ///
    /// Only 9-bit frames without parity carry more than a byte of data.
    pub fn unit_bytes(&self) -> usize {
        match (self.word_length, self.parity) {
            (WordLength::Nine, Parity::None) => 2,
            _ => 1,
        }
    }

    /// Data bits of a received frame; the parity bit is stripped
    pub fn data_mask(&self) -> u16 {
        match (self.word_length, self.parity) {
            (WordLength::Nine, Parity::None) => 0x1FF,
            (WordLength::Nine, _) | (WordLength::Eight, Parity::None) => 0xFF,
            (WordLength::Eight, _) => 0x7F,
        }
    }
}

impl Default for UartConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
