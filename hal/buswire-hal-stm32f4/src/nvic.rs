//! NVIC binding

use buswire_hal::{InterruptController, Irq};
use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

/// Priority bits implemented by the STM32F4 NVIC
pub const PRIO_BITS: u8 = 4;

/// Peripheral interrupt lines of the STM32F407 (0..=81)
pub const LINES: u16 = 82;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Line(u16);

impl Line {
    /// The line for `irq`, or `None` if the chip has no such line
    fn new(irq: Irq) -> Option<Self> {
        (irq.number() < LINES).then_some(Self(irq.number()))
    }
}

// SAFETY: Line::new only admits numbers below LINES, all of which are
// implemented interrupt lines on the STM32F407
#[allow(unsafe_code)]
unsafe impl InterruptNumber for Line {
    fn number(self) -> u16 {
        self.0
    }
}

/// Logical priority (0 = most urgent) shifted into the implemented bits
pub const fn hardware_priority(level: u8) -> u8 {
    level << (8 - PRIO_BITS)
}

/// Interrupt controller backed by the core NVIC
pub struct Nvic {
    nvic: NVIC,
}

impl Nvic {
    pub fn new(nvic: NVIC) -> Self {
        Self { nvic }
    }

    /// Give the NVIC back
    pub fn free(self) -> NVIC {
        self.nvic
    }
}

/// Lines the chip does not implement are ignored.
impl InterruptController for Nvic {
    #[allow(unsafe_code)]
    fn enable(&mut self, irq: Irq) {
        let Some(line) = Line::new(irq) else {
            return;
        };
        // SAFETY: engines unmask their line only after their handle exists
        unsafe {
            NVIC::unmask(line);
        }
    }

    fn disable(&mut self, irq: Irq) {
        if let Some(line) = Line::new(irq) {
            NVIC::mask(line);
        }
    }

    #[allow(unsafe_code)]
    fn set_priority(&mut self, irq: Irq, level: u8) {
        let Some(line) = Line::new(irq) else {
            return;
        };
        // SAFETY: no priority-based critical sections are in use
        unsafe {
            self.nvic.set_priority(line, hardware_priority(level));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_uses_upper_nibble() {
        assert_eq!(hardware_priority(0), 0x00);
        assert_eq!(hardware_priority(1), 0x10);
        assert_eq!(hardware_priority(15), 0xF0);
    }

    #[test]
    fn test_line_bounded_by_chip() {
        assert_eq!(Line::new(Irq(0)), Some(Line(0)));
        assert_eq!(Line::new(Irq(81)), Some(Line(81)));
        assert_eq!(Line::new(Irq(82)), None);
        assert_eq!(Line::new(Irq(u16::MAX)), None);
    }

    #[test]
    fn test_instance_lines_exist() {
        use buswire_core::{I2cInstance, SpiInstance, UartInstance};

        for spi in [SpiInstance::Spi1, SpiInstance::Spi2, SpiInstance::Spi3] {
            assert!(Line::new(spi.irq()).is_some());
        }
        for i2c in [I2cInstance::I2c1, I2cInstance::I2c2, I2cInstance::I2c3] {
            assert!(Line::new(i2c.event_irq()).is_some());
            assert!(Line::new(i2c.error_irq()).is_some());
        }
        for uart in [
            UartInstance::Usart1,
            UartInstance::Usart2,
            UartInstance::Usart3,
            UartInstance::Uart4,
            UartInstance::Uart5,
            UartInstance::Usart6,
        ] {
            assert!(Line::new(uart.irq()).is_some());
        }
    }
}
