//! STM32F4-Discovery wiring
//!
//! | signal    | pin  | AF |
//! |-----------|------|----|
//! | SPI2 NSS  | PB12 | 5  |
//! | SPI2 SCK  | PB13 | 5  |
//! | SPI2 MOSI | PB15 | 5  |
//! | I2C1 SCL  | PB6  | 4  |
//! | I2C1 SDA  | PB9  | 4  |
//! | USART2 TX | PA2  | 7  |
//! | USART2 RX | PA3  | 7  |

use buswire_core::config::{I2cConfig, SpiConfig, UartConfig};
use buswire_core::{I2cInstance, SpiInstance, UartInstance};
use buswire_hal::gpio::{PinConfig, Port, Pull};
use buswire_hal::spi::BaudDivisor;
use buswire_hal::PinMux;

pub const SPI: SpiInstance = SpiInstance::Spi2;
pub const I2C: I2cInstance = I2cInstance::I2c1;
pub const UART: UartInstance = UartInstance::Usart2;

/// Master, SCK = PCLK1 / 8 (2 MHz on HSI)
pub const SPI_CONFIG: SpiConfig = SpiConfig {
    baud: BaudDivisor::Div8,
    ..SpiConfig::MASTER
};
pub const I2C_CONFIG: I2cConfig = I2cConfig::STANDARD;
pub const UART_CONFIG: UartConfig = UartConfig::DEFAULT;

pub const SPI_PRIORITY: u8 = 2;
pub const I2C_PRIORITY: u8 = 1;

/// Route every bus pin to its peripheral
pub fn route_pins<M: PinMux>(mux: &mut M) {
    let spi = PinConfig {
        pull: Pull::Up,
        ..PinConfig::alternate(5)
    };
    for pin in [12, 13, 15] {
        mux.configure_pin(Port::B, pin, spi);
    }

    let i2c = PinConfig::alternate_open_drain(4);
    mux.configure_pin(Port::B, 6, i2c);
    mux.configure_pin(Port::B, 9, i2c);

    mux.configure_pin(Port::A, 2, PinConfig::alternate(7));
    mux.configure_pin(
        Port::A,
        3,
        PinConfig {
            pull: Pull::Up,
            ..PinConfig::alternate(7)
        },
    );
}
