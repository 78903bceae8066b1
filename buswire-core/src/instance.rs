//! Peripheral instances
//!
//! Each enum names one hardware communication block and knows where it
//! lives: base address, the bus that clocks it, its RCC gate and reset
//! bits, and the interrupt lines it raises. Instances are plain values;
//! the hardware they name lives for the whole program.

use buswire_hal::Irq;

use crate::clock::{Bus, ClockGate, ResetLine};

/// SPI blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpiInstance {
    Spi1,
    Spi2,
    Spi3,
}

impl SpiInstance {
    pub const fn base(self) -> u32 {
        match self {
            SpiInstance::Spi1 => 0x4001_3000,
            SpiInstance::Spi2 => 0x4000_3800,
            SpiInstance::Spi3 => 0x4000_3C00,
        }
    }

    pub const fn bus(self) -> Bus {
        match self {
            SpiInstance::Spi1 => Bus::Apb2,
            SpiInstance::Spi2 | SpiInstance::Spi3 => Bus::Apb1,
        }
    }

    const fn rcc_bit(self) -> u8 {
        match self {
            SpiInstance::Spi1 => 12,
            SpiInstance::Spi2 => 14,
            SpiInstance::Spi3 => 15,
        }
    }

    pub const fn clock_gate(self) -> ClockGate {
        ClockGate::on_bus(self.bus(), self.rcc_bit())
    }

    pub const fn reset_line(self) -> ResetLine {
        ResetLine::on_bus(self.bus(), self.rcc_bit())
    }

    /// Global interrupt line
    pub const fn irq(self) -> Irq {
        match self {
            SpiInstance::Spi1 => Irq(35),
            SpiInstance::Spi2 => Irq(36),
            SpiInstance::Spi3 => Irq(51),
        }
    }
}

/// I2C blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum I2cInstance {
    I2c1,
    I2c2,
    I2c3,
}

impl I2cInstance {
    pub const fn base(self) -> u32 {
        match self {
            I2cInstance::I2c1 => 0x4000_5400,
            I2cInstance::I2c2 => 0x4000_5800,
            I2cInstance::I2c3 => 0x4000_5C00,
        }
    }

    /// All I2C blocks hang off APB1
    pub const fn bus(self) -> Bus {
        Bus::Apb1
    }

    const fn rcc_bit(self) -> u8 {
        match self {
            I2cInstance::I2c1 => 21,
            I2cInstance::I2c2 => 22,
            I2cInstance::I2c3 => 23,
        }
    }

    pub const fn clock_gate(self) -> ClockGate {
        ClockGate::on_bus(self.bus(), self.rcc_bit())
    }

    pub const fn reset_line(self) -> ResetLine {
        ResetLine::on_bus(self.bus(), self.rcc_bit())
    }

    /// Event interrupt line
    pub const fn event_irq(self) -> Irq {
        match self {
            I2cInstance::I2c1 => Irq(31),
            I2cInstance::I2c2 => Irq(33),
            I2cInstance::I2c3 => Irq(72),
        }
    }

    /// Error interrupt line
    pub const fn error_irq(self) -> Irq {
        match self {
            I2cInstance::I2c1 => Irq(32),
            I2cInstance::I2c2 => Irq(34),
            I2cInstance::I2c3 => Irq(73),
        }
    }
}

/// USART/UART blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UartInstance {
    Usart1,
    Usart2,
    Usart3,
    Uart4,
    Uart5,
    Usart6,
}

impl UartInstance {
    pub const fn base(self) -> u32 {
        match self {
            UartInstance::Usart1 => 0x4001_1000,
            UartInstance::Usart2 => 0x4000_4400,
            UartInstance::Usart3 => 0x4000_4800,
            UartInstance::Uart4 => 0x4000_4C00,
            UartInstance::Uart5 => 0x4000_5000,
            UartInstance::Usart6 => 0x4001_1400,
        }
    }

    pub const fn bus(self) -> Bus {
        match self {
            UartInstance::Usart1 | UartInstance::Usart6 => Bus::Apb2,
            _ => Bus::Apb1,
        }
    }

    const fn rcc_bit(self) -> u8 {
        match self {
            UartInstance::Usart1 => 4,
            UartInstance::Usart2 => 17,
            UartInstance::Usart3 => 18,
            UartInstance::Uart4 => 19,
            UartInstance::Uart5 => 20,
            UartInstance::Usart6 => 5,
        }
    }

    pub const fn clock_gate(self) -> ClockGate {
        ClockGate::on_bus(self.bus(), self.rcc_bit())
    }

    pub const fn reset_line(self) -> ResetLine {
        ResetLine::on_bus(self.bus(), self.rcc_bit())
    }

    /// Global interrupt line
    pub const fn irq(self) -> Irq {
        match self {
            UartInstance::Usart1 => Irq(37),
            UartInstance::Usart2 => Irq(38),
            UartInstance::Usart3 => Irq(39),
            UartInstance::Uart4 => Irq(52),
            UartInstance::Uart5 => Irq(53),
            UartInstance::Usart6 => Irq(71),
        }
    }

    /// UART4/UART5 have no synchronous mode and no hardware flow control
    pub const fn supports_flow_control(self) -> bool {
        !matches!(self, UartInstance::Uart4 | UartInstance::Uart5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::rcc;

    #[test]
    fn test_spi_gates() {
        let gate = SpiInstance::Spi2.clock_gate();
        assert_eq!(gate.register, rcc::BASE + rcc::APB1ENR);
        assert_eq!(gate.bit, 14);

        let gate = SpiInstance::Spi1.clock_gate();
        assert_eq!(gate.register, rcc::BASE + rcc::APB2ENR);
        assert_eq!(gate.bit, 12);
    }

    #[test]
    fn test_uart_buses() {
        assert_eq!(UartInstance::Usart1.bus(), Bus::Apb2);
        assert_eq!(UartInstance::Usart6.bus(), Bus::Apb2);
        assert_eq!(UartInstance::Uart4.bus(), Bus::Apb1);
        assert_eq!(
            UartInstance::Usart6.reset_line().register,
            rcc::BASE + rcc::APB2RSTR
        );
    }

    #[test]
    fn test_i2c_irq_pairs() {
        for i2c in [I2cInstance::I2c1, I2cInstance::I2c2, I2cInstance::I2c3] {
            assert_eq!(i2c.error_irq().number(), i2c.event_irq().number() + 1);
        }
    }
}
