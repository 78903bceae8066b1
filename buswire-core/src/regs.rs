//! STM32F407 register maps
//!
//! Offsets are relative to the peripheral base address (see
//! [`crate::instance`]). Only the registers and fields the engines touch
//! are listed.

use buswire_hal::Field;

/// Reset and clock control
pub mod rcc {
    use super::Field;

    /// RCC base address
    pub const BASE: u32 = 0x4002_3800;

    /// AHB1 peripheral reset
    pub const AHB1RSTR: u32 = 0x10;
    /// APB1 peripheral reset
    pub const APB1RSTR: u32 = 0x20;
    /// APB2 peripheral reset
    pub const APB2RSTR: u32 = 0x24;
    /// Clock configuration
    pub const CFGR: u32 = 0x08;
    /// AHB1 peripheral clock enable
    pub const AHB1ENR: u32 = 0x30;
    /// APB1 peripheral clock enable
    pub const APB1ENR: u32 = 0x40;
    /// APB2 peripheral clock enable
    pub const APB2ENR: u32 = 0x44;

    /// System clock switch
    pub const CFGR_SW: Field = Field::new(0, 2);
    /// System clock switch status
    pub const CFGR_SWS: Field = Field::new(2, 2);
    /// AHB prescaler
    pub const CFGR_HPRE: Field = Field::new(4, 4);
    /// APB1 (low-speed) prescaler
    pub const CFGR_PPRE1: Field = Field::new(10, 3);
    /// APB2 (high-speed) prescaler
    pub const CFGR_PPRE2: Field = Field::new(13, 3);
}

/// Serial peripheral interface
pub mod spi {
    use super::Field;

    pub const CR1: u32 = 0x00;
    pub const CR2: u32 = 0x04;
    pub const SR: u32 = 0x08;
    pub const DR: u32 = 0x0C;

    pub const CR1_CPHA: Field = Field::bit(0);
    pub const CR1_CPOL: Field = Field::bit(1);
    pub const CR1_MSTR: Field = Field::bit(2);
    pub const CR1_BR: Field = Field::new(3, 3);
    pub const CR1_SPE: Field = Field::bit(6);
    pub const CR1_SSI: Field = Field::bit(8);
    pub const CR1_SSM: Field = Field::bit(9);
    pub const CR1_RXONLY: Field = Field::bit(10);
    pub const CR1_DFF: Field = Field::bit(11);
    pub const CR1_BIDIOE: Field = Field::bit(14);
    pub const CR1_BIDIMODE: Field = Field::bit(15);

    pub const CR2_SSOE: Field = Field::bit(2);
    pub const CR2_ERRIE: Field = Field::bit(5);
    pub const CR2_RXNEIE: Field = Field::bit(6);
    pub const CR2_TXEIE: Field = Field::bit(7);

    pub const SR_RXNE: Field = Field::bit(0);
    pub const SR_TXE: Field = Field::bit(1);
    pub const SR_MODF: Field = Field::bit(5);
    pub const SR_OVR: Field = Field::bit(6);
    pub const SR_BSY: Field = Field::bit(7);
}

/// Inter-integrated circuit
pub mod i2c {
    use super::Field;

    pub const CR1: u32 = 0x00;
    pub const CR2: u32 = 0x04;
    pub const OAR1: u32 = 0x08;
    pub const DR: u32 = 0x10;
    pub const SR1: u32 = 0x14;
    pub const SR2: u32 = 0x18;
    pub const CCR: u32 = 0x1C;
    pub const TRISE: u32 = 0x20;

    pub const CR1_PE: Field = Field::bit(0);
    pub const CR1_START: Field = Field::bit(8);
    pub const CR1_STOP: Field = Field::bit(9);
    pub const CR1_ACK: Field = Field::bit(10);
    pub const CR1_SWRST: Field = Field::bit(15);

    /// Peripheral input clock in MHz
    pub const CR2_FREQ: Field = Field::new(0, 6);
    pub const CR2_ITERREN: Field = Field::bit(8);
    pub const CR2_ITEVTEN: Field = Field::bit(9);
    pub const CR2_ITBUFEN: Field = Field::bit(10);

    /// 7-bit own address
    pub const OAR1_ADD7: Field = Field::new(1, 7);
    /// Reference manual: "should always be kept at 1 by software"
    pub const OAR1_KEEP: Field = Field::bit(14);

    pub const SR1_SB: Field = Field::bit(0);
    pub const SR1_ADDR: Field = Field::bit(1);
    pub const SR1_BTF: Field = Field::bit(2);
    pub const SR1_STOPF: Field = Field::bit(4);
    pub const SR1_RXNE: Field = Field::bit(6);
    pub const SR1_TXE: Field = Field::bit(7);
    pub const SR1_BERR: Field = Field::bit(8);
    pub const SR1_ARLO: Field = Field::bit(9);
    pub const SR1_AF: Field = Field::bit(10);
    pub const SR1_OVR: Field = Field::bit(11);
    pub const SR1_TIMEOUT: Field = Field::bit(14);

    pub const SR2_MSL: Field = Field::bit(0);
    pub const SR2_BUSY: Field = Field::bit(1);
    pub const SR2_TRA: Field = Field::bit(2);

    pub const CCR_CCR: Field = Field::new(0, 12);
    pub const CCR_DUTY: Field = Field::bit(14);
    pub const CCR_FS: Field = Field::bit(15);

    pub const TRISE_TRISE: Field = Field::new(0, 6);
}

/// Universal synchronous/asynchronous receiver transmitter
pub mod usart {
    use super::Field;

    pub const SR: u32 = 0x00;
    pub const DR: u32 = 0x04;
    pub const BRR: u32 = 0x08;
    pub const CR1: u32 = 0x0C;
    pub const CR2: u32 = 0x10;
    pub const CR3: u32 = 0x14;

    pub const SR_PE: Field = Field::bit(0);
    pub const SR_FE: Field = Field::bit(1);
    pub const SR_NF: Field = Field::bit(2);
    pub const SR_ORE: Field = Field::bit(3);
    pub const SR_RXNE: Field = Field::bit(5);
    pub const SR_TC: Field = Field::bit(6);
    pub const SR_TXE: Field = Field::bit(7);

    pub const CR1_RE: Field = Field::bit(2);
    pub const CR1_TE: Field = Field::bit(3);
    pub const CR1_RXNEIE: Field = Field::bit(5);
    pub const CR1_TCIE: Field = Field::bit(6);
    pub const CR1_TXEIE: Field = Field::bit(7);
    pub const CR1_PEIE: Field = Field::bit(8);
    pub const CR1_PS: Field = Field::bit(9);
    pub const CR1_PCE: Field = Field::bit(10);
    pub const CR1_M: Field = Field::bit(12);
    pub const CR1_UE: Field = Field::bit(13);

    pub const CR2_STOP: Field = Field::new(12, 2);

    pub const CR3_EIE: Field = Field::bit(0);
    pub const CR3_RTSE: Field = Field::bit(8);
    pub const CR3_CTSE: Field = Field::bit(9);
}

/// General-purpose I/O ports
pub mod gpio {
    /// Port A base; ports follow every 0x400
    pub const BASE: u32 = 0x4002_0000;
    pub const PORT_STRIDE: u32 = 0x400;

    pub const MODER: u32 = 0x00;
    pub const OTYPER: u32 = 0x04;
    pub const OSPEEDR: u32 = 0x08;
    pub const PUPDR: u32 = 0x0C;
    pub const AFRL: u32 = 0x20;
    pub const AFRH: u32 = 0x24;
}
