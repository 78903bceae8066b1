//! GPIO alternate-function routing

use buswire_core::regs::gpio;
use buswire_core::{Bus, ClockGate};
use buswire_hal::gpio::{OutputType, PinConfig, PinMode, Port, Pull, Speed};
use buswire_hal::{Field, PinMux, RegisterAccess};

/// Base address of a GPIO port
pub const fn port_base(port: Port) -> u32 {
    gpio::BASE + gpio::PORT_STRIDE * port.index() as u32
}

/// Clock gate of a GPIO port (RCC_AHB1ENR bit = port index)
pub const fn port_gate(port: Port) -> ClockGate {
    ClockGate::on_bus(Bus::Ahb, port.index())
}

/// [`PinMux`] writing the GPIO port registers through `R`
pub struct GpioMux<R: RegisterAccess> {
    regs: R,
}

impl<R: RegisterAccess> GpioMux<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }
}

impl<R: RegisterAccess> PinMux for GpioMux<R> {
    /// Enable the port clock and program mode, type, speed, pull and AF
    ///
    /// Pins above 15 are ignored.
    fn configure_pin(&mut self, port: Port, pin: u8, config: PinConfig) {
        if pin > 15 {
            return;
        }
        port_gate(port).set(&self.regs, true);
        let base = port_base(port);
        let pair = Field::new(pin * 2, 2);

        let mode = match config.mode {
            PinMode::Input => 0,
            PinMode::Output => 1,
            PinMode::AltFunction => 2,
            PinMode::Analog => 3,
        };
        let speed = match config.speed {
            Speed::Low => 0,
            Speed::Medium => 1,
            Speed::High => 2,
            Speed::VeryHigh => 3,
        };
        let pull = match config.pull {
            Pull::None => 0,
            Pull::Up => 1,
            Pull::Down => 2,
        };
        let open_drain = matches!(config.output_type, OutputType::OpenDrain);

        // AF first so the pin never drives with a stale function
        if config.mode == PinMode::AltFunction {
            let (afr, slot) = if pin < 8 {
                (gpio::AFRL, pin)
            } else {
                (gpio::AFRH, pin - 8)
            };
            self.regs.write_field(
                base + afr,
                Field::new(slot * 4, 4),
                config.alt_function as u32,
            );
        }
        self.regs
            .write_field(base + gpio::OTYPER, Field::bit(pin), open_drain as u32);
        self.regs.write_field(base + gpio::OSPEEDR, pair, speed);
        self.regs.write_field(base + gpio::PUPDR, pair, pull);
        self.regs.write_field(base + gpio::MODER, pair, mode);

        #[cfg(feature = "defmt")]
        defmt::trace!("GPIO{} pin {=u8}: {}", port, pin, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buswire_core::regs::rcc;
    use buswire_hal::mock::MockRegisters;

    #[test]
    fn test_port_bases() {
        assert_eq!(port_base(Port::A), 0x4002_0000);
        assert_eq!(port_base(Port::B), 0x4002_0400);
        assert_eq!(port_base(Port::I), 0x4002_2000);
    }

    #[test]
    fn test_spi_pin_high_slot() {
        let regs = MockRegisters::new();
        let mut mux = GpioMux::new(&regs);
        let base = port_base(Port::B);

        // SPI2 SCK on PB13, AF5
        mux.configure_pin(Port::B, 13, PinConfig::alternate(5));

        assert_eq!(regs.peek(base + gpio::MODER), 2 << 26);
        assert_eq!(regs.peek(base + gpio::OSPEEDR), 2 << 26);
        assert_eq!(regs.peek(base + gpio::AFRH), 5 << 20);
        assert_eq!(regs.peek(base + gpio::AFRL), 0);
        assert_eq!(regs.peek(base + gpio::OTYPER), 0);
        assert_eq!(regs.peek(rcc::BASE + rcc::AHB1ENR), 1 << 1);
    }

    #[test]
    fn test_i2c_pin_open_drain_pull_up() {
        let regs = MockRegisters::new();
        let mut mux = GpioMux::new(&regs);
        let base = port_base(Port::B);

        // I2C1 SCL on PB6, AF4
        mux.configure_pin(Port::B, 6, PinConfig::alternate_open_drain(4));

        assert_eq!(regs.peek(base + gpio::OTYPER), 1 << 6);
        assert_eq!(regs.peek(base + gpio::PUPDR), 1 << 12);
        assert_eq!(regs.peek(base + gpio::AFRL), 4 << 24);
    }

    #[test]
    fn test_reconfigure_keeps_neighbours() {
        let regs = MockRegisters::new();
        let mut mux = GpioMux::new(&regs);
        let base = port_base(Port::A);

        mux.configure_pin(Port::A, 2, PinConfig::alternate(7));
        mux.configure_pin(Port::A, 3, PinConfig::alternate(7));
        mux.configure_pin(Port::A, 2, PinConfig::default());

        assert_eq!(regs.peek(base + gpio::MODER), 2 << 6);
        assert_eq!(regs.peek(base + gpio::AFRL), 7 << 12 | 7 << 8);
    }

    #[test]
    fn test_out_of_range_pin_ignored() {
        let regs = MockRegisters::new();
        let mut mux = GpioMux::new(&regs);
        mux.configure_pin(Port::C, 16, PinConfig::alternate(1));
        assert!(regs.log().is_empty());
    }
}
